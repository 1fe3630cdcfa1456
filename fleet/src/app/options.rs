//! Command line options

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::FleetError;

/// Parsed command line: `wpfleet <command> --key=value --flag`
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub command: Option<String>,
    values: HashMap<String, String>,
}

impl CliArgs {
    /// Parse arguments, program name excluded
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Self::default();

        for arg in args {
            let arg = arg.as_ref();
            if let Some(option) = arg.strip_prefix("--") {
                match option.split_once('=') {
                    // Handle --key=value format
                    Some((key, value)) => {
                        parsed.values.insert(key.to_string(), value.to_string());
                    }
                    // Handle standalone flags like --upload
                    None => {
                        parsed.values.insert(option.to_string(), "true".to_string());
                    }
                }
            } else if parsed.command.is_none() {
                parsed.command = Some(arg.to_string());
            }
        }

        parsed
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1") | Some("yes"))
    }

    /// A value the command cannot run without
    pub fn require(&self, key: &str) -> Result<&str, FleetError> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(FleetError::ValidationError(format!("Missing --{key}=<value>"))),
        }
    }

    /// Comma separated values; empty when the option is absent
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse a value, falling back to `default` when absent
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, FleetError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map_err(|_| FleetError::ValidationError(format!("Invalid --{key}: {value}"))),
            None => Ok(default),
        }
    }

    /// Data root override
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.get("data-dir").map(PathBuf::from)
    }
}
