//! Progress tracking and reporting for export runs

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback for export operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a run walks the account
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    GalleryStarted {
        gallery_id: i64,
        path: String,
        index: usize,
        total: usize,
    },
    BatchFetched {
        gallery_id: i64,
        offset: usize,
        count: usize,
    },
    RetryAttempt {
        gallery_id: i64,
        offset: usize,
        attempt: usize,
        max_attempts: usize,
    },
    ItemDownloaded {
        item_id: i64,
        path: PathBuf,
        size: u64,
    },
    ItemAlreadyPresent {
        item_id: i64,
        path: PathBuf,
    },
    ItemFailed {
        item_id: i64,
        url: String,
        error: String,
    },
    GallerySkipped {
        gallery_id: i64,
    },
    GalleryAbandoned {
        gallery_id: i64,
        offset: usize,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_gallery_started(&self, _gallery_id: i64, _path: &str, _index: usize, _total: usize) {}
    fn on_batch_fetched(&self, _gallery_id: i64, _offset: usize, _count: usize) {}
    fn on_retry_attempt(&self, _gallery_id: i64, _offset: usize, _attempt: usize, _max_attempts: usize) {}
    fn on_item_downloaded(&self, _item_id: i64, _path: &Path, _size: u64) {}
    fn on_item_already_present(&self, _item_id: i64, _path: &Path) {}
    fn on_item_failed(&self, _item_id: i64, _url: &str, _error: &str) {}
    fn on_gallery_skipped(&self, _gallery_id: i64) {}
    fn on_gallery_abandoned(&self, _gallery_id: i64, _offset: usize) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::GalleryStarted { gallery_id, path, index, total } => {
                self.on_gallery_started(gallery_id, &path, index, total);
            }
            ProgressEvent::BatchFetched { gallery_id, offset, count } => {
                self.on_batch_fetched(gallery_id, offset, count);
            }
            ProgressEvent::RetryAttempt { gallery_id, offset, attempt, max_attempts } => {
                self.on_retry_attempt(gallery_id, offset, attempt, max_attempts);
            }
            ProgressEvent::ItemDownloaded { item_id, path, size } => {
                self.on_item_downloaded(item_id, &path, size);
            }
            ProgressEvent::ItemAlreadyPresent { item_id, path } => {
                self.on_item_already_present(item_id, &path);
            }
            ProgressEvent::ItemFailed { item_id, url, error } => {
                self.on_item_failed(item_id, &url, &error);
            }
            ProgressEvent::GallerySkipped { gallery_id } => {
                self.on_gallery_skipped(gallery_id);
            }
            ProgressEvent::GalleryAbandoned { gallery_id, offset } => {
                self.on_gallery_abandoned(gallery_id, offset);
            }
        })
    }
}

/// Send an event to the callback when one is installed
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_gallery_started(&self, _gallery_id: i64, path: &str, index: usize, total: usize) {
        println!("[{}/{}] {}", index + 1, total, path);
    }

    fn on_batch_fetched(&self, gallery_id: i64, offset: usize, count: usize) {
        if self.verbose {
            println!("  gallery {gallery_id}: {count} items from offset {offset}");
        }
    }

    fn on_retry_attempt(&self, gallery_id: i64, offset: usize, attempt: usize, max_attempts: usize) {
        println!("  gallery {gallery_id}: retrying offset {offset} ({attempt}/{max_attempts})");
    }

    fn on_item_downloaded(&self, _item_id: i64, path: &Path, size: u64) {
        if self.verbose {
            println!("  saved {} ({size} bytes)", path.display());
        }
    }

    fn on_item_already_present(&self, _item_id: i64, path: &Path) {
        if self.verbose {
            println!("  exists {}", path.display());
        }
    }

    fn on_item_failed(&self, item_id: i64, url: &str, error: &str) {
        println!("  failed {item_id} ({url}): {error}");
    }

    fn on_gallery_skipped(&self, gallery_id: i64) {
        println!("  gallery {gallery_id} is archived, skipped");
    }

    fn on_gallery_abandoned(&self, gallery_id: i64, offset: usize) {
        println!("  gallery {gallery_id} abandoned at offset {offset}");
    }
}
