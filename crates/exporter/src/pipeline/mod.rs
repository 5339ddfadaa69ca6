//! End-to-end export run
//!
//! Authenticate, load the account tree, then for every gallery in order:
//! unlock its access realm if needed, page through its items, and for each
//! item load metadata and download it. Only login and the initial tree load
//! can abort the run; everything later is recorded in the ledgers and
//! skipped.

use std::path::{Path, PathBuf};
use tracing::{Instrument, error, info, info_span, warn};

use crate::api::auth::{Session, authenticate};
use crate::api::keyring::{Keyring, load_gallery_access, unlock};
use crate::api::transport::{HttpTransport, Transport};
use crate::core::files::{ensure_dir, file_exists};
use crate::core::progress::emit;
use crate::core::{ExportConfig, ProgressCallback, ProgressEvent, Result, RunMetrics, RunMetricsSnapshot};
use crate::crawl::hierarchy::{LeafGallery, fetch_hierarchy, flatten_leaf_galleries};
use crate::download::{DownloadOutcome, Downloader, asset_path};
use crate::ledger::{Ledger, LedgerCounts};
use crate::media::enumerator::{GalleryRef, ListingOutcome, ListingSettings, MediaEnumerator, MediaItem};
use crate::media::metadata::load_item_metadata;

/// What a run did, plus the state of the ledgers afterwards
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub metrics: RunMetricsSnapshot,
    pub galleries_found: usize,
    pub ledger: LedgerCounts,
    pub failed_downloads_file: PathBuf,
    pub skipped_albums_file: PathBuf,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.ledger.failed_lines > 0
    }

    pub fn has_skips(&self) -> bool {
        self.ledger.skipped_entries > 0
    }

    /// Human-readable closing report
    pub fn report_lines(&self) -> Vec<String> {
        let m = &self.metrics;
        let mut lines = vec![format!(
            "Processed {} of {} galleries: {} downloaded ({:.1} MB), {} already present, {} failed",
            m.galleries_visited,
            self.galleries_found,
            m.items_downloaded,
            m.total_mb(),
            m.items_present,
            m.items_failed,
        )];

        if self.has_failures() {
            lines.push(format!(
                "Failed downloads logged: {} entries in {}",
                self.ledger.failed_entries(),
                self.failed_downloads_file.display()
            ));
            lines.push("Rerun the export later to retry failed downloads.".to_string());
        }
        if self.has_skips() {
            lines.push(format!(
                "Skipped galleries (possibly archived): {} entries in {}",
                self.ledger.skipped_entries,
                self.skipped_albums_file.display()
            ));
            lines.push(
                "Archived galleries must be restored from the web interface before they can be exported."
                    .to_string(),
            );
        }
        lines
    }
}

/// Per-run state threaded through every stage
pub struct RunContext<'a> {
    transport: &'a dyn Transport,
    config: &'a ExportConfig,
    session: Session,
    keyring: Keyring,
    ledger: Ledger,
    metrics: RunMetrics,
    progress: Option<ProgressCallback>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        config: &'a ExportConfig,
        session: Session,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            transport,
            config,
            session,
            keyring: Keyring::default(),
            ledger: Ledger::from_config(config),
            metrics: RunMetrics::default(),
            progress,
        }
    }

    /// Export one gallery; never fails
    pub async fn export_gallery(&mut self, gallery: &LeafGallery) {
        self.metrics.record_gallery_visited();

        let access = load_gallery_access(self.transport, &self.session, gallery.id).await;
        if access.is_restricted() {
            self.keyring = unlock(
                self.transport,
                &self.session,
                &self.keyring,
                access.realm_id,
                self.config.realm_password(),
            )
            .await;
        }

        let folder = self.config.download_folder.join(gallery.path.relative_path());
        let gallery_ref = GalleryRef {
            id: gallery.id,
            title: access.title.unwrap_or_else(|| gallery.title.clone()),
        };

        let mut enumerator = MediaEnumerator::new(
            self.transport,
            &self.session,
            &self.keyring,
            &self.ledger,
            gallery_ref,
            ListingSettings::from(self.config),
        )
        .with_progress(self.progress.clone());

        while let Some(batch) = enumerator.next_batch().await {
            for item in &batch {
                self.export_item(item, &folder).await;
            }
        }

        self.metrics.record_listing_calls(enumerator.calls() as u64);
        self.metrics.record_retries(enumerator.retries() as u64);
        match enumerator.outcome() {
            Some(ListingOutcome::Archived) => {
                self.metrics.record_gallery_skipped();
                emit(self.progress.as_ref(), ProgressEvent::GallerySkipped { gallery_id: gallery.id });
            }
            Some(ListingOutcome::Abandoned { offset }) => {
                self.metrics.record_gallery_abandoned();
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::GalleryAbandoned { gallery_id: gallery.id, offset: *offset },
                );
            }
            _ => {}
        }
    }

    /// Load metadata and download one item; never fails
    async fn export_item(&self, item: &MediaItem, folder: &Path) {
        // Resumed runs skip the metadata call for items already on disk.
        let existing = asset_path(folder, item);
        if file_exists(&existing).await {
            self.metrics.record_item_present();
            emit(
                self.progress.as_ref(),
                ProgressEvent::ItemAlreadyPresent { item_id: item.id, path: existing },
            );
            return;
        }

        let metadata = load_item_metadata(self.transport, &self.session, &self.keyring, item.id)
            .await
            .into_metadata();
        let downloader = Downloader::new(self.transport, &self.ledger, self.config.sidecar_format);

        match downloader
            .download_item(&self.session, &self.keyring, item, &metadata, folder)
            .await
        {
            DownloadOutcome::Downloaded { path, size, sidecar } => {
                self.metrics.record_item_downloaded(size, sidecar.is_some());
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::ItemDownloaded { item_id: item.id, path, size },
                );
            }
            DownloadOutcome::AlreadyExists { path } => {
                self.metrics.record_item_present();
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::ItemAlreadyPresent { item_id: item.id, path },
                );
            }
            DownloadOutcome::Failed { error } => {
                self.metrics.record_item_failed();
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::ItemFailed { item_id: item.id, url: item.url.clone(), error },
                );
            }
        }
    }

    async fn summary(&self, galleries_found: usize) -> RunSummary {
        RunSummary {
            metrics: self.metrics.snapshot(),
            galleries_found,
            ledger: self.ledger.counts().await,
            failed_downloads_file: self.ledger.failed_path().to_path_buf(),
            skipped_albums_file: self.ledger.skipped_path().to_path_buf(),
        }
    }
}

/// Run a full export against `transport`
///
/// Returns an error only for invalid configuration, failed login, or a
/// transport failure while loading the account tree.
pub async fn run(
    config: &ExportConfig,
    transport: &dyn Transport,
    progress: Option<ProgressCallback>,
) -> Result<RunSummary> {
    config.validate()?;
    ensure_dir(&config.download_folder).await?;

    let session = authenticate(transport, &config.login_name, &config.password)
        .await
        .inspect_err(|e| error!(error = %e, "Login failed"))?;
    let mut context = RunContext::new(transport, config, session, progress);

    let Some(root) = fetch_hierarchy(transport, &context.session, &config.login_name).await? else {
        warn!("Account hierarchy unavailable, nothing to export");
        return Ok(context.summary(0).await);
    };

    let galleries = flatten_leaf_galleries(&root, config.include_collections);
    info!(count = galleries.len(), include_collections = config.include_collections, "Exporting galleries");

    for (index, gallery) in galleries.iter().enumerate() {
        emit(
            context.progress.as_ref(),
            ProgressEvent::GalleryStarted {
                gallery_id: gallery.id,
                path: gallery.path.to_string(),
                index,
                total: galleries.len(),
            },
        );
        context
            .export_gallery(gallery)
            .instrument(info_span!("gallery", id = gallery.id, path = %gallery.path))
            .await;
    }

    let summary = context.summary(galleries.len()).await;
    info!(
        downloaded = summary.metrics.items_downloaded,
        present = summary.metrics.items_present,
        failed = summary.metrics.items_failed,
        "Export finished"
    );
    Ok(summary)
}

/// Convenience wrapper owning the configuration and the HTTP transport
pub struct Exporter {
    config: ExportConfig,
    transport: HttpTransport,
    progress: Option<ProgressCallback>,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            config,
            transport,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(&self) -> Result<RunSummary> {
        run(&self.config, &self.transport, self.progress.clone()).await
    }
}

#[cfg(test)]
mod tests;
