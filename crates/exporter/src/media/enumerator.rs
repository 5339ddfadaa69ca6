//! Paged listing of a gallery's media items
//!
//! Listings are fetched in fixed-size batches. Each offset gets a bounded
//! number of attempts with linear backoff; a gallery the service reports as
//! archived is recorded as skipped, and an offset that exhausts its attempts
//! is recorded as a failure. Either way the listing ends and the run moves on.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::auth::Session;
use crate::api::envelope;
use crate::api::keyring::Keyring;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::progress::emit;
use crate::core::{ExportConfig, ExportError, ProgressCallback, ProgressEvent, Result};
use crate::ledger::Ledger;
use crate::media::kind::{MediaKind, resolve_mime};

const LIST_METHOD: &str = "LoadPhotoSetPhotos";

/// Markers in a failed listing body meaning the gallery is in cold storage
const ARCHIVAL_MARKERS: [&str; 2] = ["retrieving", "archived"];

/// Gallery an item belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryRef {
    pub id: i64,
    pub title: String,
}

/// One downloadable item of a gallery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: i64,
    pub url: String,
    pub file_name: String,
    pub caption: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub gallery: GalleryRef,
}

/// How a listing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// An empty batch was returned
    Complete,
    /// The service reported the gallery as archived
    Archived,
    /// Every attempt at `offset` failed
    Abandoned { offset: usize },
}

/// Paging and retry knobs, taken from [`ExportConfig`]
#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub batch_size: usize,
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl ListingSettings {
    /// Delay before the given zero-based attempt
    pub fn delay_before(&self, attempt: usize) -> Duration {
        self.retry_delay.saturating_mul(attempt as u32)
    }
}

impl From<&ExportConfig> for ListingSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay,
        }
    }
}

/// Lazy batch-by-batch listing of one gallery
pub struct MediaEnumerator<'a> {
    transport: &'a dyn Transport,
    session: &'a Session,
    keyring: &'a Keyring,
    ledger: &'a Ledger,
    gallery: GalleryRef,
    settings: ListingSettings,
    progress: Option<ProgressCallback>,
    offset: usize,
    calls: usize,
    retries: usize,
    outcome: Option<ListingOutcome>,
}

impl<'a> MediaEnumerator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        session: &'a Session,
        keyring: &'a Keyring,
        ledger: &'a Ledger,
        gallery: GalleryRef,
        settings: ListingSettings,
    ) -> Self {
        Self {
            transport,
            session,
            keyring,
            ledger,
            gallery,
            settings,
            progress: None,
            offset: 0,
            calls: 0,
            retries: 0,
            outcome: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// How the listing ended, once it has
    pub fn outcome(&self) -> Option<&ListingOutcome> {
        self.outcome.as_ref()
    }

    /// Listing calls issued so far, retries included
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Fetch the next batch; `None` once the listing has ended
    pub async fn next_batch(&mut self) -> Option<Vec<MediaItem>> {
        if self.outcome.is_some() {
            return None;
        }

        let request = ApiRequest::new(LIST_METHOD)
            .field("photoSetId", self.gallery.id)
            .field("startingIndex", self.offset)
            .field("numberOfPhotos", self.settings.batch_size)
            .with_session(self.session)
            .with_keyring(self.keyring);

        for attempt in 0..self.settings.max_attempts {
            if attempt > 0 {
                self.retries += 1;
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::RetryAttempt {
                        gallery_id: self.gallery.id,
                        offset: self.offset,
                        attempt: attempt + 1,
                        max_attempts: self.settings.max_attempts,
                    },
                );
                sleep(self.settings.delay_before(attempt)).await;
            }

            self.calls += 1;
            let error = match self.transport.call(&request).await {
                Ok(body) => match parse_media_batch(&body, &self.gallery) {
                    Ok(items) => return self.accept(items),
                    Err(e) => e,
                },
                Err(ExportError::ApiStatus { body, .. }) if is_archived(&body) => {
                    info!(gallery_id = self.gallery.id, "Gallery appears to be archived, skipping");
                    self.ledger.record_skip(self.gallery.id).await;
                    self.outcome = Some(ListingOutcome::Archived);
                    return None;
                }
                Err(e) => e,
            };

            warn!(
                gallery_id = self.gallery.id,
                offset = self.offset,
                attempt = attempt + 1,
                max_attempts = self.settings.max_attempts,
                error = %error,
                "Listing attempt failed"
            );
            if error.is_connection_failure() {
                if let Err(e) = self.transport.reconnect().await {
                    warn!(error = %e, "Reconnect failed");
                }
            }
        }

        warn!(gallery_id = self.gallery.id, offset = self.offset, "Giving up on gallery listing");
        self.ledger.record_listing_failure(self.gallery.id, self.offset).await;
        self.outcome = Some(ListingOutcome::Abandoned { offset: self.offset });
        None
    }

    fn accept(&mut self, items: Vec<MediaItem>) -> Option<Vec<MediaItem>> {
        if items.is_empty() {
            debug!(gallery_id = self.gallery.id, offset = self.offset, "Listing complete");
            self.outcome = Some(ListingOutcome::Complete);
            return None;
        }

        emit(
            self.progress.as_ref(),
            ProgressEvent::BatchFetched {
                gallery_id: self.gallery.id,
                offset: self.offset,
                count: items.len(),
            },
        );
        self.offset += self.settings.batch_size;
        Some(items)
    }
}

fn is_archived(body: &str) -> bool {
    ARCHIVAL_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Parse one listing batch, dropping items without a download URL
pub fn parse_media_batch(body: &str, gallery: &GalleryRef) -> Result<Vec<MediaItem>> {
    let doc = envelope::parse(LIST_METHOD, body)?;

    let items = doc
        .descendants()
        .filter(|n| n.is_element() && n.has_tag_name((envelope::API_NAMESPACE, "Photo")))
        .filter_map(|photo| {
            let url = envelope::child_text(photo, "OriginalUrl")?.to_string();
            let id = envelope::child_id(photo, "Id").unwrap_or(0);
            let mime_type = resolve_mime(envelope::child_text(photo, "MimeType"), &url);

            Some(MediaItem {
                id,
                file_name: envelope::child_text(photo, "FileName")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("media_{id}")),
                caption: envelope::child_text(photo, "Caption").unwrap_or_default().to_string(),
                kind: MediaKind::from_mime(&mime_type),
                mime_type,
                url,
                gallery: gallery.clone(),
            })
        })
        .collect();
    Ok(items)
}
