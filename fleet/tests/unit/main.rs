//! Integration tests

mod test_artifacts;
mod test_audit;
mod test_bulk;
mod test_gateway;
mod test_site_ops;
