//! Session file management
//!
//! A session is the credential context every panel call runs under. It is
//! created by `login`, kept in `session.json` (owner read/write only) and
//! removed by `logout`.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::FleetError;
use crate::filesys::file::File;
use crate::utils::new_session_id;

/// Panel credentials plus the session identity
#[derive(Debug)]
pub struct Session {
    pub host: String,
    pub port: u16,
    pub user: String,
    password: SecretString,

    /// Identifier stamped on audit events; fixed for the session's lifetime
    pub session_id: String,

    pub created_at: DateTime<Utc>,
}

/// On-disk form of a session
#[derive(Serialize, Deserialize)]
struct SessionRecord {
    host: String,
    port: u16,
    user: String,
    password: String,
    session_id: String,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session with a fresh session id
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>, password: String) -> Self {
        let user = user.into();
        Self {
            host: host.into(),
            port,
            session_id: new_session_id(&user),
            user,
            password: SecretString::from(password),
            created_at: Utc::now(),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Persist the session, readable by the owner only
    pub async fn save(&self, file: &File) -> Result<(), FleetError> {
        let record = SessionRecord {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password().to_string(),
            session_id: self.session_id.clone(),
            created_at: self.created_at,
        };
        let contents = serde_json::to_vec_pretty(&record)?;
        file.write_private(&contents).await
    }

    /// Load the stored session, if any
    pub async fn load(file: &File) -> Result<Option<Self>, FleetError> {
        if !file.exists().await {
            return Ok(None);
        }

        let record: SessionRecord = file.read_json().await.map_err(|e| {
            FleetError::ConfigError(format!("Failed to read session file: {}", e))
        })?;

        if record.host.is_empty() || record.user.is_empty() {
            return Err(FleetError::ConfigError(
                "Session file is missing host or user".to_string(),
            ));
        }

        Ok(Some(Self {
            host: record.host,
            port: record.port,
            user: record.user,
            password: SecretString::from(record.password),
            session_id: record.session_id,
            created_at: record.created_at,
        }))
    }

    /// Remove the stored session
    pub async fn clear(file: &File) -> Result<(), FleetError> {
        file.delete().await
    }
}
