//! Per-item descriptive metadata
//!
//! Loading metadata never fails the item: any problem yields empty fields
//! and the sentinel capture timestamp, and the download goes ahead.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use roxmltree::Node;
use tracing::{debug, warn};

use crate::api::auth::Session;
use crate::api::envelope;
use crate::api::keyring::Keyring;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::Result;

const PHOTO_METHOD: &str = "LoadPhoto";

/// Capture timestamp used when none is known
pub const SENTINEL_TIMESTAMP: &str = "1900:01:01 00:00:00";
/// Canonical capture timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// EXIF DateTimeOriginal
const DATE_TIME_ORIGINAL_TAG: i64 = 36867;

const DATE_TIME_LAYOUTS: [&str; 6] = [
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Descriptive fields of a media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub caption: String,
    pub copyright: String,
    pub keywords: Vec<String>,
    /// `YYYY:MM:DD HH:MM:SS`, or [`SENTINEL_TIMESTAMP`]
    pub captured_at: String,
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            caption: String::new(),
            copyright: String::new(),
            keywords: Vec::new(),
            captured_at: SENTINEL_TIMESTAMP.to_string(),
        }
    }
}

impl MediaMetadata {
    pub fn keywords_joined(&self) -> String {
        self.keywords.join(", ")
    }
}

/// Result of a metadata lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    Loaded(MediaMetadata),
    /// The lookup failed; defaults apply
    Empty,
}

impl MetadataLookup {
    pub fn is_loaded(&self) -> bool {
        matches!(self, MetadataLookup::Loaded(_))
    }

    pub fn into_metadata(self) -> MediaMetadata {
        match self {
            MetadataLookup::Loaded(metadata) => metadata,
            MetadataLookup::Empty => MediaMetadata::default(),
        }
    }
}

/// Load descriptive metadata for one item
pub async fn load_item_metadata(
    transport: &dyn Transport,
    session: &Session,
    keyring: &Keyring,
    item_id: i64,
) -> MetadataLookup {
    match try_load(transport, session, keyring, item_id).await {
        Ok(Some(metadata)) => MetadataLookup::Loaded(metadata),
        Ok(None) => {
            debug!(item_id, "No metadata in response");
            MetadataLookup::Empty
        }
        Err(e) => {
            warn!(item_id, error = %e, "Metadata lookup failed, using defaults");
            MetadataLookup::Empty
        }
    }
}

async fn try_load(
    transport: &dyn Transport,
    session: &Session,
    keyring: &Keyring,
    item_id: i64,
) -> Result<Option<MediaMetadata>> {
    let request = ApiRequest::new(PHOTO_METHOD)
        .field("photoId", item_id)
        .field("level", "Full")
        .with_session(session)
        .with_keyring(keyring);
    let body = transport.call(&request).await?;
    parse_photo_metadata(&body)
}

/// Parse a `LoadPhoto` response
pub fn parse_photo_metadata(body: &str) -> Result<Option<MediaMetadata>> {
    let doc = envelope::parse(PHOTO_METHOD, body)?;
    let Some(photo) = envelope::find(&doc, "LoadPhotoResult") else {
        return Ok(None);
    };

    let text = |name: &str| envelope::child_text(photo, name).unwrap_or_default().to_string();
    let keywords = envelope::child(photo, "Keywords")
        .map(|list| {
            envelope::children(list, "string")
                .filter_map(envelope::text)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let captured_at = capture_tag_value(photo)
        .and_then(normalize_capture_timestamp)
        .unwrap_or_else(|| SENTINEL_TIMESTAMP.to_string());

    Ok(Some(MediaMetadata {
        title: text("Title"),
        caption: text("Caption"),
        copyright: text("Copyright"),
        keywords,
        captured_at,
    }))
}

/// Value of the DateTimeOriginal tag, wherever the EXIF list nests it
fn capture_tag_value<'a>(photo: Node<'a, '_>) -> Option<&'a str> {
    photo
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "ExifTags")
        .flat_map(|tags| std::iter::once(tags).chain(tags.children().filter(|n| n.is_element())))
        .find(|tag| envelope::child_id(*tag, "Id") == Some(DATE_TIME_ORIGINAL_TAG))
        .and_then(|tag| envelope::child_text(tag, "Value"))
}

/// Re-format a capture timestamp into `YYYY:MM:DD HH:MM:SS`; `None` if unparseable
pub fn normalize_capture_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local().format(TIMESTAMP_FORMAT).to_string());
    }
    for layout in DATE_TIME_LAYOUTS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(parsed.format(TIMESTAMP_FORMAT).to_string());
        }
    }
    for layout in ["%Y:%m:%d", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }
    None
}
