//! Audit trail

pub mod context;
pub mod event;
pub mod sink;

pub use context::AuditContext;
pub use event::{assess_risk, AuditEntry, AuditEvent, EventCategory, Outcome, RiskLevel};
pub use sink::{AuditSink, Auditor, FileAuditLog, MemoryAuditLog};
