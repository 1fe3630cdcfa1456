//! wpfleet library
//!
//! Operations on a fleet of WordPress sites managed through the Softaculous
//! API of a cPanel hosting account, with an append-only audit trail.

pub mod app;
pub mod artifacts;
pub mod audit;
pub mod bulk;
pub mod codec;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod upload;
pub mod utils;
