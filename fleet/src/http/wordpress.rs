//! WordPress installation and plugin operations

use crate::codec::PhpValue;
use crate::errors::FleetError;
use crate::http::{check_vendor_error, PanelClient};
use crate::models::installation::{parse_installations, Installation};
use crate::models::plugin::{parse_plugins, Plugin};

impl PanelClient {
    /// List every WordPress installation on the account
    pub async fn list_installations(&self) -> Result<Vec<Installation>, FleetError> {
        let payload = check_vendor_error(self.call("wordpress", None, None).await?)?;
        parse_installations(&payload)
    }

    /// List the plugins of one installation
    pub async fn list_plugins(&self, insid: &str) -> Result<Vec<Plugin>, FleetError> {
        let body = [("insid", insid), ("type", "plugins"), ("list", "1")];
        let payload = check_vendor_error(self.call("wordpress", Some(&body[..]), None).await?)?;
        parse_plugins(&payload)
    }

    /// Update one plugin, or every plugin when `slug` is `None`
    pub async fn update_plugins(
        &self,
        insid: &str,
        slug: Option<&str>,
    ) -> Result<PhpValue, FleetError> {
        let (action, body): (&str, Vec<(&str, &str)>) = match slug {
            Some(slug) => (
                "PLUGIN_UPDATE",
                vec![("insid", insid), ("type", "plugins"), ("slug", slug), ("update", "1")],
            ),
            None => (
                "PLUGIN_BULK_UPDATE",
                vec![("insid", insid), ("type", "plugins"), ("bulk_update", "1")],
            ),
        };

        let result = self.plugin_call(&body).await;
        self.audit_site_access(action, Some(insid), &result, slug.map(|s| ("slug", s)));
        result
    }

    /// Activate a plugin
    pub async fn activate_plugin(&self, insid: &str, slug: &str) -> Result<PhpValue, FleetError> {
        self.toggle_plugin("PLUGIN_ACTIVATE", "activate", insid, slug)
            .await
    }

    /// Deactivate a plugin
    pub async fn deactivate_plugin(
        &self,
        insid: &str,
        slug: &str,
    ) -> Result<PhpValue, FleetError> {
        self.toggle_plugin("PLUGIN_DEACTIVATE", "deactivate", insid, slug)
            .await
    }

    /// Install a plugin from the WordPress.org directory
    pub async fn install_plugin(&self, insid: &str, slug: &str) -> Result<PhpValue, FleetError> {
        self.toggle_plugin("PLUGIN_INSTALL", "install", insid, slug)
            .await
    }

    /// Upgrade WordPress core to the version the panel offers
    pub async fn upgrade_core(&self, insid: &str) -> Result<PhpValue, FleetError> {
        let body = [("softsubmit", "1")];
        let query = [("insid", insid)];
        let result = self
            .call("upgrade", Some(&body[..]), Some(&query[..]))
            .await
            .and_then(check_vendor_error);
        self.audit_site_access("CORE_UPDATE", Some(insid), &result, None);
        result
    }

    async fn toggle_plugin(
        &self,
        action: &str,
        flag: &str,
        insid: &str,
        slug: &str,
    ) -> Result<PhpValue, FleetError> {
        let body = [("insid", insid), ("type", "plugins"), ("slug", slug), (flag, "1")];
        let result = self.plugin_call(&body).await;
        self.audit_site_access(action, Some(insid), &result, Some(("slug", slug)));
        result
    }

    async fn plugin_call(&self, body: &[(&str, &str)]) -> Result<PhpValue, FleetError> {
        self.call("wordpress", Some(body), None)
            .await
            .and_then(check_vendor_error)
    }
}
