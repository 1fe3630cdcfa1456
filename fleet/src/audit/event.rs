//! Audit event model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::context::AuditContext;
use crate::errors::FleetError;

/// Event category; each category has its own log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Authentication,
    SiteAccess,
    BulkOperation,
    ApiCall,
    FileOperation,
    ExportOperation,
    Security,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::Authentication,
        EventCategory::SiteAccess,
        EventCategory::BulkOperation,
        EventCategory::ApiCall,
        EventCategory::FileOperation,
        EventCategory::ExportOperation,
        EventCategory::Security,
    ];

    /// Stem of the category's log file
    pub fn log_name(&self) -> &'static str {
        match self {
            EventCategory::Authentication => "authentication",
            EventCategory::SiteAccess => "site_access",
            EventCategory::BulkOperation => "bulk_operation",
            EventCategory::ApiCall => "api_call",
            EventCategory::FileOperation => "file_operation",
            EventCategory::ExportOperation => "export_operation",
            EventCategory::Security => "security",
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase().replace('-', "_");
        EventCategory::ALL
            .into_iter()
            .find(|c| c.log_name() == wanted)
            .ok_or_else(|| format!("Invalid event category: {}", s))
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_name().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Risk of an event, derived from what happened and how it ended
pub fn assess_risk(category: EventCategory, action: &str, outcome: Outcome) -> RiskLevel {
    match (category, outcome) {
        (EventCategory::Authentication, Outcome::Failure) => RiskLevel::High,
        (EventCategory::BulkOperation, _) | (EventCategory::Security, _) => RiskLevel::High,
        (EventCategory::SiteAccess, _) if action.to_uppercase().contains("UPDATE") => {
            RiskLevel::Medium
        }
        (EventCategory::ApiCall, Outcome::Failure) => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// What a caller knows about an event; the ambient fields are added on record
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub category: EventCategory,
    pub action: String,
    pub outcome: Outcome,
    pub insid: Option<String>,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AuditEntry {
    pub fn new(category: EventCategory, action: impl Into<String>) -> Self {
        Self {
            category,
            action: action.into(),
            outcome: Outcome::Success,
            insid: None,
            details: serde_json::Map::new(),
        }
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn installation(mut self, insid: impl Into<String>) -> Self {
        self.insid = Some(insid.into());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Record `error` when the result failed, and set the outcome from it
    pub fn result<T>(self, result: &Result<T, FleetError>) -> Self {
        match result {
            Ok(_) => self.outcome(Outcome::Success),
            Err(e) => self.outcome(Outcome::Failure).detail("error", e.to_string()),
        }
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub actor: String,
    pub source_address: String,
    pub session_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insid: Option<String>,
    pub outcome: Outcome,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub risk: RiskLevel,
}

impl AuditEvent {
    /// Stamp an entry with time, identity and risk
    pub fn from_entry(entry: AuditEntry, context: &AuditContext) -> Self {
        let risk = assess_risk(entry.category, &entry.action, entry.outcome);
        Self {
            id: crate::utils::generate_uuid(),
            timestamp: Utc::now(),
            category: entry.category,
            actor: context.actor.clone(),
            source_address: context.source_address.clone(),
            session_id: context.session_id.clone(),
            action: entry.action,
            insid: entry.insid,
            outcome: entry.outcome,
            details: entry.details,
            risk,
        }
    }

    /// Serialized record, one line, no trailing newline
    pub fn to_json_line(&self) -> Result<String, FleetError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the event is duplicated into the security log
    pub fn is_security_relevant(&self) -> bool {
        match self.category {
            EventCategory::Security => true,
            EventCategory::Authentication | EventCategory::ApiCall => {
                self.outcome == Outcome::Failure
            }
            _ => false,
        }
    }
}
