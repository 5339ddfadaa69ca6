//! Configuration types for the export pipeline

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{ExportError, FileOperation, Result};

pub const DEFAULT_API_URL: &str = "https://api.zenfolio.com/api/1.8/zfapi.asmx";
pub const DEFAULT_DOWNLOAD_FOLDER: &str = "ZenfolioBackup";
pub const FAILED_DOWNLOADS_FILE_NAME: &str = "failed_downloads.txt";
pub const SKIPPED_ALBUMS_FILE_NAME: &str = "skipped_albums.txt";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Shape of the per-image metadata file written next to each downloaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidecarFormat {
    /// `Key: value` lines
    Text,
    /// XMP packet readable by photo managers
    #[default]
    Xmp,
}

impl SidecarFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SidecarFormat::Text => "txt",
            SidecarFormat::Xmp => "xmp",
        }
    }
}

impl fmt::Display for SidecarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidecarFormat::Text => write!(f, "text"),
            SidecarFormat::Xmp => write!(f, "xmp"),
        }
    }
}

impl FromStr for SidecarFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(SidecarFormat::Text),
            "xmp" => Ok(SidecarFormat::Xmp),
            other => Err(format!("unknown sidecar format '{other}' (expected 'text' or 'xmp')")),
        }
    }
}

/// Configuration for an export run
///
/// One value of this type is built at startup and passed by reference to
/// every stage of the pipeline.
#[derive(Clone)]
pub struct ExportConfig {
    pub api_url: String,
    pub download_folder: PathBuf,
    /// Defaults to `failed_downloads.txt` inside the download folder
    pub failed_downloads_file: Option<PathBuf>,
    /// Defaults to `skipped_albums.txt` inside the download folder
    pub skipped_albums_file: Option<PathBuf>,
    pub login_name: String,
    pub password: String,
    /// Password used to unlock access realms; falls back to `password`
    pub realm_password: Option<String>,
    /// Walk nested collections; when false only galleries directly under the root are exported
    pub include_collections: bool,
    pub sidecar_format: SidecarFormat,
    /// Deadline for one API call
    pub request_timeout: Duration,
    /// Deadline for one asset download, body included; large videos need minutes
    pub download_timeout: Duration,
    /// Attempts per listing offset before the gallery is abandoned
    pub max_attempts: usize,
    /// Linear backoff step between listing attempts
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub user_agent: String,
}

impl ExportConfig {
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    pub fn failed_downloads_path(&self) -> PathBuf {
        self.failed_downloads_file
            .clone()
            .unwrap_or_else(|| self.download_folder.join(FAILED_DOWNLOADS_FILE_NAME))
    }

    pub fn skipped_albums_path(&self) -> PathBuf {
        self.skipped_albums_file
            .clone()
            .unwrap_or_else(|| self.download_folder.join(SKIPPED_ALBUMS_FILE_NAME))
    }

    pub fn realm_password(&self) -> &str {
        self.realm_password.as_deref().unwrap_or(&self.password)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.login_name.trim().is_empty() {
            return Err(invalid("login name is required", "login_name"));
        }
        if self.password.is_empty() {
            return Err(invalid("password is required", "password"));
        }
        if self.download_folder.as_os_str().is_empty() {
            return Err(invalid("download folder must not be empty", "download_folder"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be at least 1", "batch_size"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max attempts must be at least 1", "max_attempts"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request timeout must be positive", "request_timeout"));
        }
        if self.download_timeout.is_zero() {
            return Err(invalid("download timeout must be positive", "download_timeout"));
        }
        url::Url::parse(&self.api_url)
            .map_err(|e| invalid(&format!("api url '{}' is invalid: {e}", self.api_url), "api_url"))?;
        Ok(())
    }
}

fn invalid(message: &str, field: &str) -> ExportError {
    ExportError::Configuration {
        message: message.to_string(),
        field: Some(field.to_string()),
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            download_folder: PathBuf::from(DEFAULT_DOWNLOAD_FOLDER),
            failed_downloads_file: None,
            skipped_albums_file: None,
            login_name: String::new(),
            password: String::new(),
            realm_password: None,
            include_collections: true,
            sidecar_format: SidecarFormat::Xmp,
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            batch_size: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("api_url", &self.api_url)
            .field("download_folder", &self.download_folder)
            .field("failed_downloads_file", &self.failed_downloads_file)
            .field("skipped_albums_file", &self.skipped_albums_file)
            .field("login_name", &self.login_name)
            .field("password", &"<redacted>")
            .field("realm_password", &self.realm_password.as_ref().map(|_| "<redacted>"))
            .field("include_collections", &self.include_collections)
            .field("sidecar_format", &self.sidecar_format)
            .field("request_timeout", &self.request_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Optional settings read from a JSON file; every field overrides the default when present
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub download_folder: Option<PathBuf>,
    pub failed_downloads_file: Option<PathBuf>,
    pub skipped_albums_file: Option<PathBuf>,
    pub login_name: Option<String>,
    pub password: Option<String>,
    pub realm_password: Option<String>,
    pub include_collections: Option<bool>,
    pub sidecar_format: Option<SidecarFormat>,
    pub request_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub max_attempts: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub user_agent: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(ExportError::file_system(path, FileOperation::Read))?;
        serde_json::from_str(&text).map_err(|source| ExportError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Builder for [`ExportConfig`]; later calls override earlier ones
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Overlay every field present in a config file
    pub fn file(mut self, file: FileConfig) -> Self {
        let c = &mut self.config;
        if let Some(v) = file.api_url {
            c.api_url = v;
        }
        if let Some(v) = file.download_folder {
            c.download_folder = v;
        }
        if let Some(v) = file.failed_downloads_file {
            c.failed_downloads_file = Some(v);
        }
        if let Some(v) = file.skipped_albums_file {
            c.skipped_albums_file = Some(v);
        }
        if let Some(v) = file.login_name {
            c.login_name = v;
        }
        if let Some(v) = file.password {
            c.password = v;
        }
        if let Some(v) = file.realm_password {
            c.realm_password = Some(v);
        }
        if let Some(v) = file.include_collections {
            c.include_collections = v;
        }
        if let Some(v) = file.sidecar_format {
            c.sidecar_format = v;
        }
        if let Some(v) = file.request_timeout_secs {
            c.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.download_timeout_secs {
            c.download_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.max_attempts {
            c.max_attempts = v;
        }
        if let Some(v) = file.retry_delay_ms {
            c.retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.batch_size {
            c.batch_size = v;
        }
        if let Some(v) = file.user_agent {
            c.user_agent = v;
        }
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn download_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.config.download_folder = folder.into();
        self
    }

    pub fn failed_downloads_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.failed_downloads_file = Some(path.into());
        self
    }

    pub fn skipped_albums_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.skipped_albums_file = Some(path.into());
        self
    }

    pub fn credentials(mut self, login_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.login_name = login_name.into();
        self.config.password = password.into();
        self
    }

    pub fn login_name(mut self, login_name: impl Into<String>) -> Self {
        self.config.login_name = login_name.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn realm_password(mut self, password: impl Into<String>) -> Self {
        self.config.realm_password = Some(password.into());
        self
    }

    pub fn include_collections(mut self, include: bool) -> Self {
        self.config.include_collections = include;
        self
    }

    pub fn sidecar_format(mut self, format: SidecarFormat) -> Self {
        self.config.sidecar_format = format;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn build(self) -> ExportConfig {
        self.config
    }
}
