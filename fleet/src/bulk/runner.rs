//! Bulk runner
//!
//! Visits sites one at a time in input order and applies the selected
//! actions to each. A failed action becomes an error line; nothing aborts
//! the run.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, Auditor, EventCategory, Outcome};
use crate::bulk::phase::{BulkEvent, BulkPhaseFsm};
use crate::codec::PhpValue;
use crate::errors::FleetError;
use crate::http::PanelClient;
use crate::models::Installation;

/// Site action a bulk run can apply
///
/// The derived ordering is the order actions run within one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BulkAction {
    UpdatePlugins,
    UpgradeCore,
    CreateBackup,
}

impl BulkAction {
    pub const ALL: [BulkAction; 3] = [
        BulkAction::UpdatePlugins,
        BulkAction::UpgradeCore,
        BulkAction::CreateBackup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BulkAction::UpdatePlugins => "update_plugins",
            BulkAction::UpgradeCore => "upgrade_core",
            BulkAction::CreateBackup => "create_backup",
        }
    }

    fn done_message(&self) -> &'static str {
        match self {
            BulkAction::UpdatePlugins => "Plugins updated",
            BulkAction::UpgradeCore => "WordPress core upgraded",
            BulkAction::CreateBackup => "Backup created",
        }
    }

    fn failed_message(&self) -> &'static str {
        match self {
            BulkAction::UpdatePlugins => "Plugin update failed",
            BulkAction::UpgradeCore => "Core upgrade failed",
            BulkAction::CreateBackup => "Backup failed",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BulkAction {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "update_plugins" | "plugins" => Ok(BulkAction::UpdatePlugins),
            "upgrade_core" | "core" | "upgrade" => Ok(BulkAction::UpgradeCore),
            "create_backup" | "backup" => Ok(BulkAction::CreateBackup),
            other => Err(FleetError::ValidationError(format!(
                "Unknown bulk action: {other}"
            ))),
        }
    }
}

/// Site operations the runner needs
#[async_trait]
pub trait SiteOps: Send + Sync {
    async fn update_plugins(&self, insid: &str) -> Result<PhpValue, FleetError>;

    async fn upgrade_core(&self, insid: &str) -> Result<PhpValue, FleetError>;

    async fn create_backup(&self, insid: &str) -> Result<PhpValue, FleetError>;
}

#[async_trait]
impl SiteOps for PanelClient {
    async fn update_plugins(&self, insid: &str) -> Result<PhpValue, FleetError> {
        PanelClient::update_plugins(self, insid, None).await
    }

    async fn upgrade_core(&self, insid: &str) -> Result<PhpValue, FleetError> {
        PanelClient::upgrade_core(self, insid).await
    }

    async fn create_backup(&self, insid: &str) -> Result<PhpValue, FleetError> {
        PanelClient::create_backup(self, insid).await
    }
}

/// Outcome lines of one bulk run
#[derive(Debug, Clone, Default)]
pub struct BulkOperationResult {
    pub successes: Vec<String>,
    pub errors: Vec<String>,
    pub total_sites: usize,
}

impl BulkOperationResult {
    pub fn total(&self) -> usize {
        self.successes.len() + self.errors.len()
    }

    /// More than half of the outcomes failed
    pub fn high_failure_rate(&self) -> bool {
        self.errors.len() * 2 > self.total()
    }
}

pub struct BulkRunner {
    ops: Arc<dyn SiteOps>,
    auditor: Auditor,
}

impl BulkRunner {
    pub fn new(ops: Arc<dyn SiteOps>, auditor: Auditor) -> Self {
        Self { ops, auditor }
    }

    /// Apply `actions` to every site in `sites`
    ///
    /// `progress` is called after each site with the number of sites done,
    /// the total and the site just finished.
    pub async fn run<F>(
        &self,
        sites: &[Installation],
        actions: &BTreeSet<BulkAction>,
        mut progress: F,
    ) -> Result<BulkOperationResult, FleetError>
    where
        F: FnMut(usize, usize, &Installation),
    {
        if sites.is_empty() {
            warn!("Bulk run requested with no sites");
            return Err(FleetError::ValidationError("No sites selected".into()));
        }
        if actions.is_empty() {
            warn!("Bulk run requested with no actions");
            return Err(FleetError::ValidationError("No actions selected".into()));
        }

        let action_names: Vec<String> = actions.iter().map(|a| a.name().to_string()).collect();
        let mut fsm = BulkPhaseFsm::new();
        fsm.process(BulkEvent::Start { sites: sites.len() })
            .map_err(FleetError::Internal)?;

        info!(
            "Starting bulk run over {} sites: {}",
            sites.len(),
            action_names.join(", ")
        );
        self.auditor.record(
            AuditEntry::new(EventCategory::BulkOperation, "BULK_START")
                .detail("site_count", sites.len())
                .detail("actions", action_names.clone()),
        );

        let mut result = BulkOperationResult {
            total_sites: sites.len(),
            ..Default::default()
        };

        for site in sites {
            for action in actions {
                debug!("{} on {} ({})", action, site.display_name, site.insid);
                match self.perform(*action, &site.insid).await {
                    Ok(_) => result
                        .successes
                        .push(format!("{} for {}", action.done_message(), site.display_name)),
                    Err(e) => result.errors.push(format!(
                        "{} for {}: {}",
                        action.failed_message(),
                        site.display_name,
                        e
                    )),
                }
            }

            fsm.process(BulkEvent::SiteDone).map_err(FleetError::Internal)?;
            let (done, total) = fsm.progress();
            progress(done, total, site);
        }

        fsm.process(BulkEvent::Finish).map_err(FleetError::Internal)?;
        self.record_completion(&result, action_names);
        Ok(result)
    }

    async fn perform(&self, action: BulkAction, insid: &str) -> Result<PhpValue, FleetError> {
        match action {
            BulkAction::UpdatePlugins => self.ops.update_plugins(insid).await,
            BulkAction::UpgradeCore => self.ops.upgrade_core(insid).await,
            BulkAction::CreateBackup => self.ops.create_backup(insid).await,
        }
    }

    fn record_completion(&self, result: &BulkOperationResult, action_names: Vec<String>) {
        let outcome = if result.errors.is_empty() {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        info!(
            "Bulk run complete: {} succeeded, {} failed",
            result.successes.len(),
            result.errors.len()
        );
        self.auditor.record(
            AuditEntry::new(EventCategory::BulkOperation, "BULK_COMPLETE")
                .outcome(outcome)
                .detail("total", result.total())
                .detail("success_count", result.successes.len())
                .detail("failure_count", result.errors.len())
                .detail("actions", action_names),
        );

        if result.high_failure_rate() {
            warn!(
                "High failure rate in bulk run: {}/{}",
                result.errors.len(),
                result.total()
            );
            self.auditor.record(
                AuditEntry::new(EventCategory::Security, "HIGH_FAILURE_RATE")
                    .outcome(Outcome::Failure)
                    .detail("failure_count", result.errors.len())
                    .detail("total", result.total()),
            );
        }
    }
}
