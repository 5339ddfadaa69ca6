use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use exporter::{ExportConfig, FileConfig, SidecarFormat};

/// Back up every gallery of a Zenfolio account to a local folder
#[derive(Debug, Parser)]
#[command(name = "zfbackup", version)]
pub struct Cli {
    /// JSON file with default settings; flags override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root folder of the local copy
    #[arg(long, short = 'd', value_name = "DIR")]
    pub download_folder: Option<PathBuf>,

    /// Where items that failed to download are recorded
    #[arg(long, value_name = "FILE")]
    pub failed_downloads_file: Option<PathBuf>,

    /// Where archived galleries are recorded
    #[arg(long, value_name = "FILE")]
    pub skipped_albums_file: Option<PathBuf>,

    #[arg(long, env = "ZENFOLIO_LOGIN")]
    pub login_name: Option<String>,

    #[arg(long, env = "ZENFOLIO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Password for protected galleries (defaults to the account password)
    #[arg(long, env = "ZENFOLIO_REALM_PASSWORD", hide_env_values = true)]
    pub realm_password: Option<String>,

    /// Sidecar written next to each image: xmp or text
    #[arg(long, value_name = "FORMAT")]
    pub sidecar_format: Option<SidecarFormat>,

    /// Only export galleries sitting directly under the account root
    #[arg(long)]
    pub top_level_only: bool,

    /// Timeout for each API call, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Time allowed for one photo or video download, in seconds
    #[arg(long, value_name = "SECS")]
    pub download_timeout: Option<u64>,

    /// Attempts per listing page before giving up on a gallery
    #[arg(long)]
    pub max_attempts: Option<usize>,

    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Print every saved file
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Layer flags over the optional config file over built-in defaults
    pub fn export_config(&self) -> exporter::Result<ExportConfig> {
        let mut builder = ExportConfig::builder();
        if let Some(path) = &self.config {
            builder = builder.file(FileConfig::load(path)?);
        }

        if let Some(folder) = &self.download_folder {
            builder = builder.download_folder(folder);
        }
        if let Some(path) = &self.failed_downloads_file {
            builder = builder.failed_downloads_file(path);
        }
        if let Some(path) = &self.skipped_albums_file {
            builder = builder.skipped_albums_file(path);
        }
        if let Some(login) = &self.login_name {
            builder = builder.login_name(login);
        }
        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if let Some(password) = &self.realm_password {
            builder = builder.realm_password(password);
        }
        if let Some(format) = self.sidecar_format {
            builder = builder.sidecar_format(format);
        }
        if self.top_level_only {
            builder = builder.include_collections(false);
        }
        if let Some(secs) = self.timeout {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.download_timeout {
            builder = builder.download_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(url) = &self.api_url {
            builder = builder.api_url(url);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "exporter=debug,zfbackup=debug"
        } else if self.quiet {
            "warn"
        } else {
            "exporter=info,zfbackup=info"
        }
    }
}
