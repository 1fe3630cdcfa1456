//! Local artifacts: downloaded backups, archives and reports

pub mod export;
pub mod store;

pub use export::{export_installations, ExportFormat};
pub use store::{archive_name, list_artifacts, ArtifactStore, LocalArtifact};
