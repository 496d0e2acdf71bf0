//! blog/crates/domains/src/lib.rs
//!
//! Entities, identifiers, errors and port traits shared by every other crate.
//! Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
