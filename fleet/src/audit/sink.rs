//! Audit sinks
//!
//! [`Auditor`] is what the rest of the crate records through: it stamps each
//! [`AuditEntry`] with the session's identity and hands the finished event to
//! an [`AuditSink`]. Sink failures are logged and dropped; recording never
//! fails from the caller's point of view.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, info, warn};

use crate::audit::context::AuditContext;
use crate::audit::event::{AuditEntry, AuditEvent, EventCategory, RiskLevel};
use crate::errors::FleetError;

/// Destination for finished audit events
pub trait AuditSink: Send + Sync {
    fn write(&self, event: &AuditEvent) -> Result<(), FleetError>;
}

/// Records entries on behalf of one session
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    context: AuditContext,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        Self { sink, context }
    }

    pub fn context(&self) -> &AuditContext {
        &self.context
    }

    /// Record one event
    pub fn record(&self, entry: AuditEntry) {
        let event = AuditEvent::from_entry(entry, &self.context);

        match event.risk {
            RiskLevel::High => warn!(
                target: "audit",
                category = %event.category,
                action = %event.action,
                outcome = ?event.outcome,
                "high risk event"
            ),
            _ => info!(
                target: "audit",
                category = %event.category,
                action = %event.action,
                outcome = ?event.outcome,
                "audit event"
            ),
        }

        if let Err(e) = self.sink.write(&event) {
            error!("Failed to write audit event {}: {}", event.id, e);
        }
    }
}

/// Append-only JSON-lines files under one directory
///
/// Each event lands in `<category>.jsonl` and the day's
/// `audit_<YYYY-MM-DD>.jsonl`; security-relevant events are also copied to
/// `security.jsonl`. Files are never truncated or rewritten.
pub struct FileAuditLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn category_file(&self, category: EventCategory) -> PathBuf {
        self.dir.join(format!("{}.jsonl", category.log_name()))
    }

    pub fn main_file(&self, date: chrono::NaiveDate) -> PathBuf {
        self.dir.join(format!("audit_{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub fn security_file(&self) -> PathBuf {
        self.category_file(EventCategory::Security)
    }

    /// Most recent `limit` events of a log file, oldest first
    pub fn tail(&self, path: &Path, limit: usize) -> Result<Vec<AuditEvent>, FleetError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(limit);
        lines[start..]
            .iter()
            .map(|line| serde_json::from_str(line).map_err(FleetError::from))
            .collect()
    }

    fn append(&self, path: &Path, line: &str) -> Result<(), FleetError> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

impl AuditSink for FileAuditLog {
    fn write(&self, event: &AuditEvent) -> Result<(), FleetError> {
        let line = event.to_json_line()?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        std::fs::create_dir_all(&self.dir)?;
        self.append(&self.category_file(event.category), &line)?;
        self.append(&self.main_file(event.timestamp.date_naive()), &line)?;
        if event.is_security_relevant() && event.category != EventCategory::Security {
            self.append(&self.security_file(), &line)?;
        }
        Ok(())
    }
}

/// In-memory sink, for tests and dry runs
#[derive(Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn by_category(&self, category: EventCategory) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }

    pub fn by_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn write(&self, event: &AuditEvent) -> Result<(), FleetError> {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
