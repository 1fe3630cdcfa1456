//! Control panel API

pub mod backups;
pub mod client;
pub mod wordpress;

use crate::audit::{AuditEntry, EventCategory};
use crate::codec::PhpValue;
use crate::errors::FleetError;

pub use client::{PanelClient, Params};

/// Treat a payload carrying a non-empty `error` entry as a failed call
pub(crate) fn check_vendor_error(payload: PhpValue) -> Result<PhpValue, FleetError> {
    let message = match payload.get("error") {
        Some(error) if error.is_truthy() => vendor_message(error),
        _ => return Ok(payload),
    };
    Err(FleetError::VendorError(message))
}

fn vendor_message(error: &PhpValue) -> String {
    match error.entries() {
        Some(entries) => entries
            .iter()
            .filter_map(|(_, v)| v.as_text())
            .collect::<Vec<_>>()
            .join("; "),
        None => error.as_text().unwrap_or_default(),
    }
}

impl PanelClient {
    /// Record the outcome of a mutating site operation
    pub(crate) fn audit_site_access<T>(
        &self,
        action: &str,
        insid: Option<&str>,
        result: &Result<T, FleetError>,
        extra: Option<(&str, &str)>,
    ) {
        let mut entry = AuditEntry::new(EventCategory::SiteAccess, action).result(result);
        if let Some(insid) = insid {
            entry = entry.installation(insid);
        }
        if let Some((key, value)) = extra {
            entry = entry.detail(key, value);
        }
        self.auditor().record(entry);
    }
}
