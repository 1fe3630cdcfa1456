//! Installation models

use serde::{Deserialize, Serialize};

use crate::codec::PhpValue;
use crate::errors::FleetError;

/// One managed WordPress site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Installation ID assigned by the panel (`insid`)
    pub insid: String,

    /// Site URL as recorded by the panel
    pub domain: String,

    /// Filesystem path of the installation
    pub path: String,

    /// Installed WordPress version
    pub version: String,

    /// Owning hosting account user
    pub user: String,

    /// `<domain>/<directory>`
    pub display_name: String,
}

impl Installation {
    /// Build an installation from one entry of the panel's `installations` map
    pub fn from_php(insid: &str, data: &PhpValue) -> Self {
        Self {
            insid: insid.to_string(),
            domain: data.text_or("softurl", ""),
            path: data.text_or("softpath", ""),
            version: data.text_or("ver", ""),
            user: data.text_or("cuser", ""),
            display_name: format!(
                "{}/{}",
                data.text_or("softdomain", ""),
                data.text_or("softdirectory", "")
            ),
        }
    }

    /// Site URL with a scheme
    pub fn full_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.clone()
        } else {
            format!("https://{}", self.domain)
        }
    }
}

/// Parse the `wordpress` action's response into installations, in panel order
pub fn parse_installations(payload: &PhpValue) -> Result<Vec<Installation>, FleetError> {
    let entries = payload
        .get("installations")
        .ok_or_else(|| FleetError::MalformedResponse("missing `installations`".to_string()))?;

    // Accounts without installations may send null; an empty array is an empty map
    let entries = match entries {
        PhpValue::Null => return Ok(Vec::new()),
        other => other.entries().ok_or_else(|| {
            FleetError::MalformedResponse("`installations` is not a map".to_string())
        })?,
    };

    Ok(entries
        .iter()
        .map(|(insid, data)| Installation::from_php(&insid.to_string(), data))
        .collect())
}
