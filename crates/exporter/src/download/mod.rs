//! Media download with idempotent skip and sidecar generation
//!
//! An item whose target file already exists is never fetched again, which
//! makes re-running an interrupted export cheap. New assets are streamed to
//! a temporary file and renamed into place, so a half-written asset is never
//! mistaken for a finished one on the next run.

pub mod sidecar;

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::api::auth::Session;
use crate::api::keyring::Keyring;
use crate::api::transport::Transport;
use crate::core::files::{ensure_dir, file_exists};
use crate::core::{Result, SidecarFormat};
use crate::crawl::paths::normalize_segment;
use crate::ledger::Ledger;
use crate::media::enumerator::MediaItem;
use crate::media::kind::extension_for;
use crate::media::metadata::MediaMetadata;

pub use sidecar::{clean_markup, render_text, render_xmp, sidecar_path, write_sidecar};

/// Outcome of materializing one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The asset was transferred
    Downloaded {
        path: PathBuf,
        size: u64,
        sidecar: Option<PathBuf>,
    },
    /// The asset was already on disk; nothing was transferred
    AlreadyExists { path: PathBuf },
    /// The item was recorded in the failure ledger
    Failed { error: String },
}

/// Local path of an item's asset inside `folder`
///
/// The remote file name is normalized and its extension replaced with one
/// chosen from the MIME type. Everything after the last dot counts as the
/// extension, so `2024.05.01 Beach` lands at `2024.05.jpg` and names that
/// differ only after their last dot share one file.
pub fn asset_path(folder: &Path, item: &MediaItem) -> PathBuf {
    let mut path = folder.join(normalize_segment(&item.file_name));
    path.set_extension(extension_for(&item.mime_type, &item.url));
    path
}

/// Downloads items and writes their sidecars
pub struct Downloader<'a> {
    transport: &'a dyn Transport,
    ledger: &'a Ledger,
    sidecar_format: SidecarFormat,
}

impl<'a> Downloader<'a> {
    pub fn new(transport: &'a dyn Transport, ledger: &'a Ledger, sidecar_format: SidecarFormat) -> Self {
        Self {
            transport,
            ledger,
            sidecar_format,
        }
    }

    /// Materialize one item under `destination`
    ///
    /// Never returns an error: failures are written to the ledger under the
    /// item's gallery title and reported as [`DownloadOutcome::Failed`].
    pub async fn download_item(
        &self,
        session: &Session,
        keyring: &Keyring,
        item: &MediaItem,
        metadata: &MediaMetadata,
        destination: &Path,
    ) -> DownloadOutcome {
        let path = asset_path(destination, item);
        if file_exists(&path).await {
            debug!("File already exists, skipping download: {}", path.display());
            return DownloadOutcome::AlreadyExists { path };
        }

        match self.materialize(session, keyring, item, metadata, destination, &path).await {
            Ok((size, sidecar)) => DownloadOutcome::Downloaded { path, size, sidecar },
            Err(e) => {
                warn!(item_id = item.id, url = %item.url, error = %e, "Download failed");
                self.ledger.record_item_failure(&item.gallery.title, item.id, &item.url).await;
                DownloadOutcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn materialize(
        &self,
        session: &Session,
        keyring: &Keyring,
        item: &MediaItem,
        metadata: &MediaMetadata,
        destination: &Path,
        path: &Path,
    ) -> Result<(u64, Option<PathBuf>)> {
        ensure_dir(destination).await?;
        let size = self
            .transport
            .fetch_to(&item.url, Some(session), Some(keyring), path)
            .await?;

        let sidecar = if item.kind.wants_sidecar() {
            Some(write_sidecar(path, item.id, metadata, self.sidecar_format).await?)
        } else {
            debug!("No sidecar for non-image item {}", path.display());
            None
        };
        Ok((size, sidecar))
    }
}
