//! # api-adapters
//!
//! HTTP surface of the blog. The axum implementation is compiled with the
//! `web-axum` feature.

#[cfg(feature = "web-axum")]
pub mod web;

#[cfg(feature = "web-axum")]
pub use web::{router, AppState};
