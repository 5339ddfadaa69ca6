//! Persistent records of what a run could not finish
//!
//! Two append-only text files survive between runs. The failure ledger
//! holds items that did not download (a gallery-name line followed by an
//! `id:url` line) and listings abandoned after every attempt
//! (`Gallery:id:offset`). The skip ledger holds archived galleries
//! (`Gallery:id`). Writes are best-effort: a ledger that cannot be written
//! is logged and the run carries on.

use std::path::{Path, PathBuf};
use tracing::error;

use crate::core::ExportConfig;
use crate::core::files::{append_lines, read_lines};

const GALLERY_PREFIX: &str = "Gallery:";

#[derive(Debug, Clone)]
pub struct Ledger {
    failed_path: PathBuf,
    skipped_path: PathBuf,
}

impl Ledger {
    pub fn new(failed_path: impl Into<PathBuf>, skipped_path: impl Into<PathBuf>) -> Self {
        Self {
            failed_path: failed_path.into(),
            skipped_path: skipped_path.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.failed_downloads_path(), config.skipped_albums_path())
    }

    pub fn failed_path(&self) -> &Path {
        &self.failed_path
    }

    pub fn skipped_path(&self) -> &Path {
        &self.skipped_path
    }

    /// Record an item that could not be downloaded
    pub async fn record_item_failure(&self, gallery_name: &str, item_id: i64, url: &str) {
        let entry = format!("{item_id}:{url}");
        self.append(&self.failed_path, &[gallery_name, &entry]).await;
    }

    /// Record a gallery listing abandoned at `offset`
    pub async fn record_listing_failure(&self, gallery_id: i64, offset: usize) {
        let entry = format!("{GALLERY_PREFIX}{gallery_id}:{offset}");
        self.append(&self.failed_path, &[&entry]).await;
    }

    /// Record a gallery skipped because it is archived
    pub async fn record_skip(&self, gallery_id: i64) {
        let entry = format!("{GALLERY_PREFIX}{gallery_id}");
        self.append(&self.skipped_path, &[&entry]).await;
    }

    /// Count the entries currently on disk
    pub async fn counts(&self) -> LedgerCounts {
        let failed = self.read(&self.failed_path).await;
        let mut counts = LedgerCounts {
            failed_lines: failed.len(),
            skipped_entries: self.read(&self.skipped_path).await.len(),
            ..Default::default()
        };

        // An `id:url` line belongs to the name line above it, whatever that name says.
        let mut lines = failed.iter().peekable();
        while let Some(line) = lines.next() {
            if lines.peek().is_some_and(|next| is_item_entry(next)) {
                lines.next();
                counts.item_failures += 1;
            } else if is_listing_failure(line) {
                counts.listing_failures += 1;
            }
        }
        counts
    }

    async fn append(&self, path: &Path, lines: &[&str]) {
        if let Err(e) = append_lines(path, lines).await {
            error!(path = %path.display(), error = %e, "Could not write ledger entry");
        }
    }

    async fn read(&self, path: &Path) -> Vec<String> {
        read_lines(path).await.unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "Could not read ledger");
            Vec::new()
        })
    }
}

/// `Gallery:<digits>:<digits>`
fn is_listing_failure(line: &str) -> bool {
    line.strip_prefix(GALLERY_PREFIX)
        .and_then(|rest| rest.split_once(':'))
        .is_some_and(|(id, offset)| {
            !id.is_empty()
                && !offset.is_empty()
                && id.chars().all(|c| c.is_ascii_digit() || c == '-')
                && offset.chars().all(|c| c.is_ascii_digit())
        })
}

/// `<digits>:<url>`
fn is_item_entry(line: &str) -> bool {
    line.split_once(':').is_some_and(|(id, url)| {
        !id.is_empty() && !url.is_empty() && id.chars().all(|c| c.is_ascii_digit() || c == '-')
    })
}

/// Entry counts of both ledgers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub failed_lines: usize,
    pub item_failures: usize,
    pub listing_failures: usize,
    pub skipped_entries: usize,
}

impl LedgerCounts {
    pub fn failed_entries(&self) -> usize {
        self.item_failures + self.listing_failures
    }

    pub fn is_clean(&self) -> bool {
        self.failed_lines == 0 && self.skipped_entries == 0
    }
}
