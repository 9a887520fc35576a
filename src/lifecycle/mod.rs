//! Ticket lifecycle: generation, consume-once resolution and read-only export.

pub mod engine;
pub mod export;
pub mod generator;

pub use engine::LifecycleEngine;
pub use export::{Export, ExportRow, Exporter, UrlBuilder};
pub use generator::TokenGenerator;
