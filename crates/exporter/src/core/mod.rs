//! Core types used throughout the exporter
//!
//! Errors, configuration, file helpers, progress events and run counters.
//! Every other module depends on these; none of these depend on the rest.

pub mod config;
pub mod error;
pub mod files;
pub mod metrics;
pub mod progress;

pub use config::{ExportConfig, ExportConfigBuilder, FileConfig, SidecarFormat};
pub use error::{ExportError, FileOperation, Result};
pub use metrics::{RunMetrics, RunMetricsSnapshot};
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, ProgressCallback, ProgressEvent, ProgressReporter,
};
