//! Error types for the export pipeline with context and recovery information

use std::path::PathBuf;
use thiserror::Error;

/// Error types raised by the exporter, carrying the context needed to
/// decide between retrying, recording, and aborting
#[derive(Error, Debug)]
pub enum ExportError {
    /// Transport-level failure (connection refused, reset, TLS, body read)
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The per-request timeout elapsed
    #[error("Request to '{url}' timed out (try increasing the request timeout)")]
    NetworkTimeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// An API call completed with a non-success HTTP status
    #[error("{action} returned HTTP {status}")]
    ApiStatus {
        action: String,
        status: u16,
        body: String,
    },

    /// A media asset fetch completed with a non-success HTTP status
    #[error("Download of '{url}' returned HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    /// A successful response lacked an element the caller depends on
    #[error("{action} response is missing '{field}'")]
    MissingField { action: String, field: String },

    /// A successful response was not well-formed XML
    #[error("{action} response is not valid XML")]
    MalformedResponse {
        action: String,
        #[source]
        source: roxmltree::Error,
    },

    /// The account credentials were rejected
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' ({operation})")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Base64 payload in a response could not be decoded
    #[error("Invalid base64 in response")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// The JSON configuration file could not be parsed
    #[error("Failed to parse config file '{path}'")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Append,
    Move,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Append => write!(f, "appending"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Build a `map_err` adapter that attaches a path and operation to an I/O error
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: FileOperation,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ExportError::FileSystem { path, operation, source }
    }

    /// True when the underlying connection should be rebuilt before retrying
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ExportError::HttpRequest { .. } | ExportError::NetworkTimeout { .. })
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(error: reqwest::Error) -> Self {
        let url = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if error.is_timeout() {
            ExportError::NetworkTimeout { url, source: error }
        } else {
            ExportError::HttpRequest { url, source: error }
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(error: std::io::Error) -> Self {
        ExportError::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: FileOperation::Read,
            source: error,
        }
    }
}
