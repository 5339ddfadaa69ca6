//! Zenfolio Exporter Library
//!
//! This library mirrors a Zenfolio account onto the local filesystem. It
//! logs in with the challenge-response scheme, walks the account's
//! collection tree, pages through every gallery's media and saves each item
//! into a folder tree matching the account, with a metadata sidecar next to
//! every image.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use exporter::{ConsoleProgressReporter, ExportConfig, Exporter, IntoProgressCallback};
//!
//! # async fn example() -> exporter::Result<()> {
//! let config = ExportConfig::builder()
//!     .credentials("someone", "secret")
//!     .download_folder("ZenfolioBackup")
//!     .build();
//!
//! let exporter = Exporter::new(config)?
//!     .with_progress(ConsoleProgressReporter::new(false).into_callback());
//!
//! let summary = exporter.run().await?;
//! for line in summary.report_lines() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Resumable**: items already on disk are never fetched again
//! - **Atomic writes**: assets land under a `.part` name and are renamed when complete
//! - **Protected galleries**: access realms are unlocked on the fly
//! - **Failure ledgers**: failed items and archived galleries are recorded for a later run
//! - **Sidecars**: XMP packets or plain text files carrying title, caption and keywords

pub mod api;
pub mod core;
pub mod crawl;
pub mod download;
pub mod ledger;
pub mod media;
pub mod pipeline;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use api::{HttpTransport, Keyring, Session, Transport};
pub use core::{
    ConsoleProgressReporter, ExportConfig, ExportConfigBuilder, ExportError, FileConfig,
    IntoProgressCallback, ProgressCallback, ProgressEvent, ProgressReporter,
    Result, RunMetricsSnapshot, SidecarFormat,
};
pub use download::{DownloadOutcome, Downloader};
pub use ledger::{Ledger, LedgerCounts};
pub use pipeline::{Exporter, RunSummary, run};
