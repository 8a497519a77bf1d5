//! Core entry point for the lookup_report crate.
//!
//! Lookup results are turned into fixed-width, variable-height blocks, flowed down a page or a
//! single canvas, framed with header and footer decorations and finally published under a
//! deterministic artifact name.

pub mod block;
pub mod builder;
pub mod compose;
pub mod config;
pub mod flow;
pub mod fonts;
pub mod metrics;
pub mod model;
pub mod publish;
pub mod service;
pub mod source;
pub mod store;
pub mod surface;
pub mod text;

#[cfg(test)]
mod http_stub;

pub use builder::{RenderReport, ReportBuilder, ReportRenderer};
pub use config::ReportConfig;
pub use model::{Record, ReportContent, ReportType};
pub use publish::{Publication, PublicationGate};
pub use surface::{OutputFormat, RenderError};
