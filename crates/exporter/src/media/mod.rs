//! Gallery listings, item classification and per-item metadata

pub mod enumerator;
pub mod kind;
pub mod metadata;

pub use enumerator::{GalleryRef, ListingOutcome, ListingSettings, MediaEnumerator, MediaItem};
pub use kind::{MediaKind, classify, extension_for};
pub use metadata::{MediaMetadata, MetadataLookup, SENTINEL_TIMESTAMP, load_item_metadata};
