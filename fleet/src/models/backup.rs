//! Backup models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::PhpValue;
use crate::errors::FleetError;

/// A backup known to the panel, keyed by file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub filename: String,

    /// Installation the backup belongs to, when the panel says so
    pub insid: Option<String>,

    /// Size in bytes, when reported
    pub size: Option<u64>,

    /// Creation time as a Unix timestamp, when reported
    pub created_at: Option<i64>,

    /// Every scalar field the panel sent, for display
    pub metadata: BTreeMap<String, String>,
}

/// Backups by file name
pub type BackupIndex = BTreeMap<String, BackupRecord>;

/// Parse the `backups` action's listing.
///
/// The panel groups backups by installation id (`backups -> insid -> file ->
/// details`); a flat `backups -> file -> details` map is also accepted.
pub fn parse_backups(payload: &PhpValue) -> Result<BackupIndex, FleetError> {
    let groups = payload
        .get("backups")
        .ok_or_else(|| FleetError::MalformedResponse("missing `backups`".to_string()))?;

    let mut index = BackupIndex::new();
    let Some(entries) = groups.entries() else {
        return Ok(index);
    };

    for (key, value) in entries {
        let key = key.to_string();
        if looks_like_record(value) {
            index.insert(key.clone(), record(&key, None, value));
            continue;
        }
        for (file, details) in value.entries().unwrap_or_default() {
            let file = file.to_string();
            index.insert(file.clone(), record(&file, Some(&key), details));
        }
    }

    Ok(index)
}

/// A record is a non-empty map of scalars; an empty array is an empty group
fn looks_like_record(value: &PhpValue) -> bool {
    value.entries().is_some_and(|entries| {
        !entries.is_empty() && entries.iter().all(|(_, v)| v.entries().is_none())
    })
}

fn record(filename: &str, group: Option<&str>, details: &PhpValue) -> BackupRecord {
    let metadata: BTreeMap<String, String> = details
        .entries()
        .unwrap_or_default()
        .iter()
        .filter_map(|(k, v)| v.as_text().map(|text| (k.to_string(), text)))
        .collect();

    let number = |key: &str| metadata.get(key).and_then(|v| v.parse::<i64>().ok());

    BackupRecord {
        filename: metadata
            .get("name")
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| filename.to_string()),
        insid: metadata
            .get("insid")
            .cloned()
            .or_else(|| group.map(str::to_string)),
        size: number("size").and_then(|n| u64::try_from(n).ok()),
        created_at: number("btime").or_else(|| number("time")),
        metadata,
    }
}
