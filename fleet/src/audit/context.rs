//! Identity stamped onto every audit event

use crate::storage::session::Session;
use crate::utils::{local_host_name, new_session_id};

/// Who is acting, from where, in which session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: String,
    pub source_address: String,
    pub session_id: String,
}

impl AuditContext {
    pub fn new(
        actor: impl Into<String>,
        source_address: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            source_address: source_address.into(),
            session_id: session_id.into(),
        }
    }

    /// Context for a logged-in session; the session id lives as long as the session
    pub fn for_session(session: &Session) -> Self {
        Self::new(&session.user, local_host_name(), &session.session_id)
    }

    /// Context without a session: `anonymous` with a per-process id
    pub fn anonymous() -> Self {
        Self::new("anonymous", local_host_name(), new_session_id("anonymous"))
    }
}
