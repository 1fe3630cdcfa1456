//! Installation reports

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::{AuditEntry, Auditor, EventCategory};
use crate::errors::FleetError;
use crate::filesys::dir::Dir;
use crate::models::Installation;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(FleetError::ValidationError(format!(
                "Unknown export format: {other}"
            ))),
        }
    }
}

/// One report row
#[derive(Debug, Clone, Serialize)]
pub struct InstallationRow<'a> {
    pub installation_id: &'a str,
    pub domain: &'a str,
    pub display_name: &'a str,
    pub path: &'a str,
    pub version: &'a str,
    pub user: &'a str,
    pub full_url: String,
}

impl<'a> From<&'a Installation> for InstallationRow<'a> {
    fn from(installation: &'a Installation) -> Self {
        Self {
            installation_id: &installation.insid,
            domain: &installation.domain,
            display_name: &installation.display_name,
            path: &installation.path,
            version: &installation.version,
            user: &installation.user,
            full_url: installation.full_url(),
        }
    }
}

/// CSV columns, in `InstallationRow` field order
pub const CSV_COLUMNS: [&str; 7] = [
    "installation_id",
    "domain",
    "display_name",
    "path",
    "version",
    "user",
    "full_url",
];

#[derive(Serialize)]
struct JsonReport<'a> {
    export_timestamp: String,
    total_installations: usize,
    installations: Vec<InstallationRow<'a>>,
}

pub fn to_csv(installations: &[Installation]) -> Result<Vec<u8>, FleetError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for installation in installations {
        writer.serialize(InstallationRow::from(installation))?;
    }
    writer
        .into_inner()
        .map_err(|e| FleetError::Internal(format!("Failed to flush CSV: {e}")))
}

pub fn to_json(installations: &[Installation], at: DateTime<Utc>) -> Result<Vec<u8>, FleetError> {
    let report = JsonReport {
        export_timestamp: at.to_rfc3339(),
        total_installations: installations.len(),
        installations: installations.iter().map(InstallationRow::from).collect(),
    };
    Ok(serde_json::to_vec_pretty(&report)?)
}

pub fn to_markdown(installations: &[Installation], at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# WordPress Installations");
    let _ = writeln!(out);
    let _ = writeln!(out, "Exported: {}", at.to_rfc3339());
    let _ = writeln!(out, "Total installations: {}", installations.len());

    for installation in installations {
        let row = InstallationRow::from(installation);
        let _ = writeln!(out);
        let _ = writeln!(out, "## {}", row.display_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "- **Installation ID:** {}", row.installation_id);
        let _ = writeln!(out, "- **Domain:** {}", row.domain);
        let _ = writeln!(out, "- **Path:** {}", row.path);
        let _ = writeln!(out, "- **Version:** {}", row.version);
        let _ = writeln!(out, "- **User:** {}", row.user);
        let _ = writeln!(out, "- **URL:** {}", row.full_url);
    }

    out
}

/// Write a report of `installations` into `dir`
pub async fn export_installations(
    installations: &[Installation],
    format: ExportFormat,
    dir: &Dir,
    auditor: &Auditor,
) -> Result<PathBuf, FleetError> {
    let result = write_report(installations, format, dir).await;
    auditor.record(
        AuditEntry::new(EventCategory::ExportOperation, "EXPORT_INSTALLATIONS")
            .result(&result)
            .detail("format", format.extension())
            .detail("count", installations.len()),
    );
    result
}

async fn write_report(
    installations: &[Installation],
    format: ExportFormat,
    dir: &Dir,
) -> Result<PathBuf, FleetError> {
    let now = Utc::now();
    let bytes = match format {
        ExportFormat::Csv => to_csv(installations)?,
        ExportFormat::Json => to_json(installations, now)?,
        ExportFormat::Markdown => to_markdown(installations, now).into_bytes(),
    };

    let name = format!(
        "wordpress_installations_{}.{}",
        now.with_timezone(&Local).format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    let file = dir.file(&name);
    file.write_atomic(&bytes).await?;
    info!(
        "Exported {} installations to {}",
        installations.len(),
        file.path().display()
    );
    Ok(file.path().to_path_buf())
}
