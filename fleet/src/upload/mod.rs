//! Off-box copies of local backups

pub mod store;

pub use store::{upload_all, SecondaryStore, WebDavStore};
