//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::FleetError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// wpfleet settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Control panel API configuration
    #[serde(default)]
    pub panel: PanelSettings,

    /// Secondary storage for backup copies
    #[serde(default)]
    pub secondary_store: Option<SecondaryStoreSettings>,
}

impl Settings {
    /// Load settings; a missing file yields the defaults
    pub async fn load(file: &File) -> Result<Self, FleetError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json().await
    }
}

fn default_true() -> bool {
    true
}

/// Control panel API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    /// `https` for cPanel's secure port
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Default port used by `login` when none is given
    #[serde(default = "default_panel_port")]
    pub default_port: u16,

    /// Path of the Softaculous endpoint on the panel
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Skip TLS certificate validation (panels commonly use self-signed certificates)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Timeout for data calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for the connectivity probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_panel_port() -> u16 {
    2083
}

fn default_api_path() -> String {
    "/frontend/jupiter/softaculous/index.live.php".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    10
}

impl PanelSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            default_port: default_panel_port(),
            api_path: default_api_path(),
            accept_invalid_certs: true,
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// Secondary storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryStoreSettings {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    pub host: String,

    #[serde(default = "default_store_port")]
    pub port: u16,

    pub user: String,

    pub password: String,

    /// Directory on the store that receives uploads
    #[serde(default)]
    pub remote_dir: String,
}

fn default_store_port() -> u16 {
    443
}
