//! gatepass: single-use QR ticket issuance and consume-once validation.
//!
//! Library crate shared by the `gatepass` binary and the integration tests in `tests/`.

pub mod api;
pub mod app;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod store;

pub use app::{router, AppState};
