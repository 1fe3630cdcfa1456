//! Panel data models

pub mod backup;
pub mod installation;
pub mod plugin;

pub use backup::{BackupIndex, BackupRecord};
pub use installation::Installation;
pub use plugin::{Plugin, PluginFilter};
