//! Backup operations

use crate::codec::PhpValue;
use crate::errors::FleetError;
use crate::http::{check_vendor_error, PanelClient};
use crate::models::backup::{parse_backups, BackupIndex};

impl PanelClient {
    /// Start a full backup (files, data directory and database) of one installation
    pub async fn create_backup(&self, insid: &str) -> Result<PhpValue, FleetError> {
        let body = [
            ("backupins", "1"),
            ("backup_dir", "1"),
            ("backup_datadir", "1"),
            ("backup_db", "1"),
        ];
        let query = [("insid", insid)];
        let result = self
            .call("backup", Some(&body[..]), Some(&query[..]))
            .await
            .and_then(check_vendor_error);
        self.audit_site_access("BACKUP_CREATE", Some(insid), &result, None);
        result
    }

    /// List backups held by the panel
    pub async fn list_backups(&self) -> Result<BackupIndex, FleetError> {
        let payload = check_vendor_error(self.call("backups", None, None).await?)?;
        parse_backups(&payload)
    }

    /// Fetch a backup file's bytes
    pub async fn download_backup(&self, filename: &str) -> Result<Vec<u8>, FleetError> {
        let query = [("download", filename)];
        self.call_raw("backups", None, Some(&query[..])).await
    }

    /// Delete a backup held by the panel
    pub async fn delete_backup(&self, filename: &str) -> Result<PhpValue, FleetError> {
        let query = [("remove", filename)];
        let result = self
            .call("backups", None, Some(&query[..]))
            .await
            .and_then(check_vendor_error);
        self.audit_site_access("BACKUP_DELETE", None, &result, Some(("filename", filename)));
        result
    }
}
