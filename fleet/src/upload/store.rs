//! Secondary storage uploads

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tokio::fs;
use tracing::{error, info};
use url::Url;

use crate::artifacts::LocalArtifact;
use crate::audit::{AuditEntry, Auditor, EventCategory};
use crate::errors::FleetError;
use crate::storage::settings::SecondaryStoreSettings;

/// Off-box copy destination for backups
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    /// Copy `local` to `remote_name` in the store's upload directory;
    /// `false` means the upload failed and was logged
    async fn upload(&self, local: &Path, remote_name: &str) -> bool;
}

/// WebDAV share, written with HTTP PUT and basic auth
pub struct WebDavStore {
    client: Client,
    base_url: Url,
    user: String,
    password: SecretString,
    auditor: Auditor,
}

impl WebDavStore {
    pub fn new(settings: &SecondaryStoreSettings, auditor: Auditor) -> Result<Self, FleetError> {
        let base = format!("{}://{}:{}/", settings.scheme, settings.host, settings.port);
        let mut base_url = Url::parse(&base)
            .map_err(|e| FleetError::ConfigError(format!("Invalid secondary store URL: {e}")))?;
        base_url
            .path_segments_mut()
            .map_err(|_| FleetError::ConfigError("Secondary store URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(settings.remote_dir.split('/').filter(|s| !s.is_empty()));

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url,
            user: settings.user.clone(),
            password: SecretString::from(settings.password.clone()),
            auditor,
        })
    }

    /// Target URL for an uploaded file
    pub fn remote_url(&self, remote_name: &str) -> Result<Url, FleetError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FleetError::ConfigError("Secondary store URL cannot hold a path".into()))?
            .pop_if_empty()
            .push(remote_name);
        Ok(url)
    }

    async fn put(&self, local: &Path, remote_name: &str) -> Result<u64, FleetError> {
        let url = self.remote_url(remote_name)?;
        let body = fs::read(local).await?;
        let size = body.len() as u64;

        let response = self
            .client
            .put(url.clone())
            .basic_auth(&self.user, Some(self.password.expose_secret()))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !(status.is_success() || status == StatusCode::NO_CONTENT) {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        info!("Uploaded {} to {}", local.display(), url);
        Ok(size)
    }
}

#[async_trait]
impl SecondaryStore for WebDavStore {
    async fn upload(&self, local: &Path, remote_name: &str) -> bool {
        let result = self.put(local, remote_name).await;
        let mut entry = AuditEntry::new(EventCategory::FileOperation, "BACKUP_UPLOAD")
            .result(&result)
            .detail("filename", remote_name);
        if let Ok(size) = &result {
            entry = entry.detail("size", *size);
        }
        self.auditor.record(entry);

        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Upload of {} failed: {}", local.display(), e);
                false
            }
        }
    }
}

/// Upload every artifact under its own name; returns how many succeeded
pub async fn upload_all(store: &dyn SecondaryStore, artifacts: &[LocalArtifact]) -> usize {
    let mut uploaded = 0;
    for artifact in artifacts {
        if store.upload(&artifact.path, &artifact.name).await {
            uploaded += 1;
        }
    }
    uploaded
}
