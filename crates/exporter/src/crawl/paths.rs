//! Local folder naming for remote titles

use std::fmt;
use std::path::PathBuf;

/// Longest normalized segment, in characters
pub const MAX_SEGMENT_LEN: usize = 50;
/// Relative path length above which a warning is logged
pub const PATH_WARN_LEN: usize = 200;

const FALLBACK_SEGMENT: &str = "Untitled";

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

/// Turn a remote title into a safe path segment
///
/// Runs of whitespace and filesystem-illegal characters collapse into a
/// single `_`, the result is cut to [`MAX_SEGMENT_LEN`] characters, and a
/// title with nothing usable left becomes `Untitled`. Applying it twice
/// gives the same result as applying it once.
pub fn normalize_segment(name: &str) -> String {
    let joined = name
        .split(is_separator)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let capped: String = joined.chars().take(MAX_SEGMENT_LEN).collect();

    if capped.is_empty() || capped.chars().all(|c| c == '.') {
        FALLBACK_SEGMENT.to_string()
    } else {
        capped
    }
}

/// Normalized folder path of a gallery, starting at the root collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GalleryPath {
    segments: Vec<String>,
}

impl GalleryPath {
    pub fn root(title: &str) -> Self {
        Self {
            segments: vec![normalize_segment(title)],
        }
    }

    pub fn child(&self, title: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(normalize_segment(title));
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Folder relative to the download root
    pub fn relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    /// Length in characters of the joined path
    pub fn len(&self) -> usize {
        let separators = self.segments.len().saturating_sub(1);
        self.segments.iter().map(|s| s.chars().count()).sum::<usize>() + separators
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn exceeds_warn_len(&self) -> bool {
        self.len() > PATH_WARN_LEN
    }
}

impl fmt::Display for GalleryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
