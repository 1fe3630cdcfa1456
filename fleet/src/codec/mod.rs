//! Payload codecs for the panel API

pub mod php;

pub use php::{from_bytes, to_bytes, PhpKey, PhpValue};
