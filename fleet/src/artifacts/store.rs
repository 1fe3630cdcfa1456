//! Local backups and archives

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::audit::{AuditEntry, Auditor, EventCategory};
use crate::errors::FleetError;
use crate::filesys::dir::Dir;
use crate::storage::layout::StorageLayout;

/// A backup, archive or report file held locally
#[derive(Debug, Clone, Serialize)]
pub struct LocalArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Last-modified time (None if the platform does not report it)
    pub modified: Option<DateTime<Utc>>,
}

impl LocalArtifact {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

/// List the files of `dir`, newest first
pub async fn list_artifacts(dir: &Dir) -> Result<Vec<LocalArtifact>, FleetError> {
    let mut artifacts = Vec::new();

    for path in dir.list_files().await? {
        let metadata = fs::metadata(&path).await?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.as_secs() as i64, d.subsec_nanos()));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        artifacts.push(LocalArtifact {
            name,
            path,
            size: metadata.len(),
            modified,
        });
    }

    artifacts.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(artifacts)
}

/// Name for a new archive: `<prefix>_<YYYYmmdd_HHMMSS>.zip`
pub fn archive_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.zip", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Reject names that would escape the directory they are written to
fn check_file_name(name: &str) -> Result<(), FleetError> {
    let path = Path::new(name);
    let is_plain = path.components().count() == 1
        && path.file_name().map(|n| n == path.as_os_str()).unwrap_or(false);
    if name.is_empty() || !is_plain {
        return Err(FleetError::ValidationError(format!(
            "Not a plain file name: {name:?}"
        )));
    }
    Ok(())
}

/// Local artifact directories of one data root
pub struct ArtifactStore {
    layout: StorageLayout,
    auditor: Auditor,
}

impl ArtifactStore {
    pub fn new(layout: StorageLayout, auditor: Auditor) -> Self {
        Self { layout, auditor }
    }

    /// Downloaded backups, newest first
    pub async fn backups(&self) -> Result<Vec<LocalArtifact>, FleetError> {
        list_artifacts(&self.layout.backups_dir()).await
    }

    /// Created archives, newest first
    pub async fn archives(&self) -> Result<Vec<LocalArtifact>, FleetError> {
        list_artifacts(&self.layout.archives_dir()).await
    }

    /// Exported reports, newest first
    pub async fn exports(&self) -> Result<Vec<LocalArtifact>, FleetError> {
        list_artifacts(&self.layout.exports_dir()).await
    }

    /// Most recently modified backup, if any
    pub async fn latest_backup(&self) -> Result<Option<LocalArtifact>, FleetError> {
        Ok(self.backups().await?.into_iter().next())
    }

    /// Store a downloaded backup under `backups/`
    pub async fn save_backup(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, FleetError> {
        let result = self.write_backup(filename, bytes).await;
        self.auditor.record(
            AuditEntry::new(EventCategory::FileOperation, "BACKUP_DOWNLOAD")
                .result(&result)
                .detail("filename", filename)
                .detail("size", bytes.len()),
        );
        result
    }

    async fn write_backup(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, FleetError> {
        check_file_name(filename)?;
        let file = self.layout.backups_dir().file(filename);
        file.write_atomic(bytes).await?;
        info!("Saved backup {} ({} bytes)", filename, bytes.len());
        Ok(file.path().to_path_buf())
    }

    /// Zip `files` into `archives/<prefix>_<timestamp>.zip`
    ///
    /// Entries are stored flat under their file names.
    pub async fn create_archive(
        &self,
        prefix: &str,
        files: &[PathBuf],
    ) -> Result<PathBuf, FleetError> {
        let result = self.write_archive(prefix, files).await;
        let mut entry = AuditEntry::new(EventCategory::FileOperation, "ARCHIVE_CREATE")
            .result(&result)
            .detail("prefix", prefix)
            .detail("file_count", files.len());
        if let Ok(path) = &result {
            entry = entry.detail("archive", path.display().to_string());
        }
        self.auditor.record(entry);
        result
    }

    async fn write_archive(&self, prefix: &str, files: &[PathBuf]) -> Result<PathBuf, FleetError> {
        check_file_name(prefix)?;
        if files.is_empty() {
            return Err(FleetError::ValidationError("No files to archive".into()));
        }

        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    FleetError::ValidationError(format!("Not a file: {}", path.display()))
                })?;
            let contents = fs::read(path).await?;
            debug!("Adding {} ({} bytes) to archive", name, contents.len());
            zip.start_file(name, options)?;
            zip.write_all(&contents)?;
        }

        let bytes = zip.finish()?.into_inner();
        let file = self
            .layout
            .archives_dir()
            .file(&archive_name(prefix, Local::now()));
        file.write_atomic(&bytes).await?;
        info!("Created archive {}", file.path().display());
        Ok(file.path().to_path_buf())
    }
}
