//! Media classification and file extension choice

use std::path::Path;

pub const JPEG_MIME: &str = "image/jpeg";
pub const MP4_MIME: &str = "video/mp4";
pub const OCTET_STREAM: &str = "application/octet-stream";

const FALLBACK_EXTENSION: &str = "dat";

/// Broad kind of a media item; only images get a sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }

    pub fn wants_sidecar(self) -> bool {
        self == MediaKind::Image
    }
}

/// Pick the MIME type for an item: the declared one, else a guess from the URL
pub fn resolve_mime(declared: Option<&str>, url: &str) -> String {
    match declared.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mime) => mime.to_string(),
        None => infer_mime_from_url(url).to_string(),
    }
}

/// Guess a MIME type from the URL's path extension
pub fn infer_mime_from_url(url: &str) -> &'static str {
    match url_extension(url).as_deref() {
        Some("mp4") => MP4_MIME,
        Some("jpg") | Some("jpeg") => JPEG_MIME,
        _ => OCTET_STREAM,
    }
}

/// Classify an item from its declared MIME type and URL
pub fn classify(declared: Option<&str>, url: &str) -> MediaKind {
    MediaKind::from_mime(&resolve_mime(declared, url))
}

/// Local file extension (without dot) for an item
///
/// Known types map to a fixed extension; anything else keeps the URL's own
/// extension, or `dat` when the URL has none.
pub fn extension_for(mime: &str, url: &str) -> String {
    match mime.trim().to_ascii_lowercase().as_str() {
        MP4_MIME => "mp4".to_string(),
        JPEG_MIME => "jpg".to_string(),
        _ => url_extension(url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
    }
}

fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Lowercased extension of the URL's last path segment
fn url_extension(url: &str) -> Option<String> {
    let path = url_path(url);
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}
