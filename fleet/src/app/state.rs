//! Application state management

use std::sync::Arc;

use tracing::{debug, info};

use crate::artifacts::ArtifactStore;
use crate::audit::{AuditContext, Auditor, FileAuditLog};
use crate::errors::FleetError;
use crate::http::PanelClient;
use crate::storage::layout::StorageLayout;
use crate::storage::session::Session;
use crate::storage::settings::Settings;
use crate::upload::WebDavStore;

/// Everything a command needs, built once per process
pub struct AppState {
    pub layout: StorageLayout,

    pub settings: Settings,

    /// Stored session, if logged in
    pub session: Option<Arc<Session>>,

    /// Audit log files under the data root
    pub audit_log: Arc<FileAuditLog>,

    /// Records on behalf of the current session
    pub auditor: Auditor,

    /// Panel client bound to the session
    pub client: Arc<PanelClient>,

    pub artifacts: ArtifactStore,
}

impl AppState {
    /// Initialize application state
    pub async fn init(layout: StorageLayout, settings: Settings) -> Result<Self, FleetError> {
        info!("Initializing wpfleet state in {}", layout.base_dir.display());
        layout.setup().await?;

        let session = Session::load(&layout.session_file()).await?.map(Arc::new);
        let context = match &session {
            Some(session) => AuditContext::for_session(session),
            None => AuditContext::anonymous(),
        };
        debug!("Audit context: {:?}", context);

        let audit_log = Arc::new(FileAuditLog::new(layout.audit_dir().path()));
        let auditor = Auditor::new(audit_log.clone(), context);
        let client = Arc::new(PanelClient::new(
            settings.panel.clone(),
            session.clone(),
            auditor.clone(),
        )?);
        let artifacts = ArtifactStore::new(layout.clone(), auditor.clone());

        Ok(Self {
            layout,
            settings,
            session,
            audit_log,
            auditor,
            client,
            artifacts,
        })
    }

    /// Secondary store from settings
    pub fn secondary_store(&self) -> Result<WebDavStore, FleetError> {
        let settings = self.settings.secondary_store.as_ref().ok_or_else(|| {
            FleetError::ConfigError("No secondary_store configured in settings.json".into())
        })?;
        WebDavStore::new(settings, self.auditor.clone())
    }
}
