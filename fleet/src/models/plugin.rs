//! Plugin models

use serde::{Deserialize, Serialize};

use crate::codec::PhpValue;
use crate::errors::FleetError;

/// A plugin installed on one WordPress site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,

    /// Plugin path as reported by the panel; unique within an installation
    pub slug: String,

    pub version: String,
    pub active: bool,
    pub update_available: bool,

    /// Version offered by the update, if any
    pub new_version: String,

    pub description: String,
}

impl Plugin {
    /// Build a plugin from one entry of the panel's `plugins` map
    pub fn from_php(slug: &str, data: &PhpValue) -> Self {
        Self {
            name: data.text_or("Name", "Unknown"),
            slug: slug.to_string(),
            version: data.text_or("Version", ""),
            active: data.flag("active"),
            update_available: data.flag("update_available"),
            new_version: data.text_or("new_version", ""),
            description: data.text_or("Description", ""),
        }
    }
}

/// Parse a plugin listing. Slugs are the map keys, so they are unique.
pub fn parse_plugins(payload: &PhpValue) -> Result<Vec<Plugin>, FleetError> {
    let entries = payload
        .get("plugins")
        .ok_or_else(|| FleetError::MalformedResponse("missing `plugins`".to_string()))?;

    let entries = match entries {
        PhpValue::Null => return Ok(Vec::new()),
        other => other
            .entries()
            .ok_or_else(|| FleetError::MalformedResponse("`plugins` is not a map".to_string()))?,
    };

    Ok(entries
        .iter()
        .map(|(slug, data)| Plugin::from_php(&slug.to_string(), data))
        .collect())
}

/// Which plugins a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginFilter {
    pub show_active: bool,
    pub show_inactive: bool,
    pub updates_only: bool,
}

impl Default for PluginFilter {
    fn default() -> Self {
        Self {
            show_active: true,
            show_inactive: true,
            updates_only: false,
        }
    }
}

impl PluginFilter {
    pub fn accepts(&self, plugin: &Plugin) -> bool {
        if self.updates_only && !plugin.update_available {
            return false;
        }
        if plugin.active {
            self.show_active
        } else {
            self.show_inactive
        }
    }

    pub fn apply<'a>(&self, plugins: &'a [Plugin]) -> Vec<&'a Plugin> {
        plugins.iter().filter(|p| self.accepts(p)).collect()
    }
}
