//! Local configuration and session storage

pub mod layout;
pub mod session;
pub mod settings;
