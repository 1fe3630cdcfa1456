//! Softaculous API client
//!
//! Every panel operation is one call to a single endpoint, selected by the
//! `act` query parameter. Responses are PHP-serialized (`api=serialize`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use crate::audit::{AuditEntry, Auditor, EventCategory};
use crate::codec::{self, PhpValue};
use crate::errors::FleetError;
use crate::storage::session::Session;
use crate::storage::settings::PanelSettings;

/// Request parameters as name/value pairs
pub type Params<'a> = [(&'a str, &'a str)];

/// Authenticated client for the panel's Softaculous endpoint
pub struct PanelClient {
    client: Client,
    settings: PanelSettings,
    session: Option<Arc<Session>>,
    auditor: Auditor,
}

impl PanelClient {
    /// Create a new client; `session` is `None` until the operator logs in
    pub fn new(
        settings: PanelSettings,
        session: Option<Arc<Session>>,
        auditor: Auditor,
    ) -> Result<Self, FleetError> {
        if settings.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for the control panel");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            settings,
            session,
            auditor,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    /// Endpoint URL for the current session
    pub fn endpoint(&self) -> Result<String, FleetError> {
        let session = self.session.as_ref().ok_or(FleetError::NotAuthenticated)?;
        Ok(format!(
            "{}://{}:{}{}",
            self.settings.scheme, session.host, session.port, self.settings.api_path
        ))
    }

    /// Call `action` and decode the serialized response
    pub async fn call(
        &self,
        action: &str,
        body: Option<&Params<'_>>,
        query: Option<&Params<'_>>,
    ) -> Result<PhpValue, FleetError> {
        let started = Instant::now();
        let result = self
            .request(action, body, query, self.settings.request_timeout())
            .await
            .and_then(|bytes| codec::from_bytes(&bytes));
        self.audit_call(action, body, query, started, &result, false);
        result
    }

    /// Call `action` and return the response body untouched (file downloads)
    pub async fn call_raw(
        &self,
        action: &str,
        body: Option<&Params<'_>>,
        query: Option<&Params<'_>>,
    ) -> Result<Vec<u8>, FleetError> {
        let started = Instant::now();
        let result = self
            .request(action, body, query, self.settings.request_timeout())
            .await;
        self.audit_call(action, body, query, started, &result, false);
        result
    }

    /// Check that the panel answers with these credentials
    pub async fn probe(&self) -> Result<(), FleetError> {
        let started = Instant::now();
        let result = self
            .request("wordpress", None, None, self.settings.probe_timeout())
            .await
            .and_then(|bytes| codec::from_bytes(&bytes))
            .map(|_| ());
        self.audit_call("wordpress", None, None, started, &result, true);
        result
    }

    async fn request(
        &self,
        action: &str,
        body: Option<&Params<'_>>,
        query: Option<&Params<'_>>,
        timeout: Duration,
    ) -> Result<Vec<u8>, FleetError> {
        let session = self.session.as_ref().ok_or(FleetError::NotAuthenticated)?;
        let url = self.endpoint()?;

        let mut params: Vec<(&str, &str)> = vec![("act", action), ("api", "serialize")];
        if let Some(query) = query {
            params.extend_from_slice(query);
        }

        let request = match body {
            Some(body) => {
                debug!("POST {} act={}", url, action);
                self.client.post(&url).form(body)
            }
            None => {
                debug!("GET {} act={}", url, action);
                self.client.get(&url)
            }
        };

        let response = request
            .query(&params)
            .basic_auth(&session.user, Some(session.password()))
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!("Panel call act={} failed: {} - {}", action, status, body);
            return Err(FleetError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn audit_call<T>(
        &self,
        action: &str,
        body: Option<&Params<'_>>,
        query: Option<&Params<'_>>,
        started: Instant,
        result: &Result<T, FleetError>,
        probe: bool,
    ) {
        let method = if body.is_some() { "POST" } else { "GET" };
        let mut entry = AuditEntry::new(EventCategory::ApiCall, action)
            .result(result)
            .detail("method", method)
            .detail("elapsed_ms", started.elapsed().as_millis() as u64);

        if probe {
            entry = entry.detail("probe", true);
        }
        if let Err(FleetError::Remote { status, .. }) = result {
            entry = entry.detail("status", *status);
        }

        let insid = [body, query]
            .into_iter()
            .flatten()
            .flat_map(|params| params.iter())
            .find(|(name, _)| *name == "insid")
            .map(|(_, value)| *value);
        if let Some(insid) = insid {
            entry = entry.installation(insid);
        }

        self.auditor.record(entry);
    }
}
