//! Sequential multi-site operations

pub mod phase;
pub mod runner;

pub use phase::{BulkEvent, BulkPhase, BulkPhaseFsm};
pub use runner::{BulkAction, BulkOperationResult, BulkRunner, SiteOps};
