//! HTTP transport for API calls and asset downloads
//!
//! [`Transport`] is the seam between the pipeline and the network. The
//! production implementation is [`HttpTransport`]; tests substitute scripted
//! transports or point it at a mock server.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::auth::Session;
use crate::api::envelope::{build_envelope, soap_action};
use crate::api::keyring::Keyring;
use crate::core::files::{atomic_rename, create_temp_path};
use crate::core::{ExportConfig, ExportError, FileOperation, Result};

/// Header carrying the session token
pub const TOKEN_HEADER: &str = "X-Zenfolio-Token";
/// Header carrying the access keyring
pub const KEYRING_HEADER: &str = "X-Zenfolio-Keyring";

/// One API method invocation
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    pub method: &'static str,
    pub fields: Vec<(&'static str, String)>,
    pub session: Option<&'a Session>,
    pub keyring: Option<&'a Keyring>,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            fields: Vec::new(),
            session: None,
            keyring: None,
        }
    }

    pub fn field(mut self, name: &'static str, value: impl ToString) -> Self {
        self.fields.push((name, value.to_string()));
        self
    }

    pub fn with_session(mut self, session: &'a Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_keyring(mut self, keyring: &'a Keyring) -> Self {
        self.keyring = Some(keyring);
        self
    }
}

/// Network operations the pipeline depends on
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke an API method and return the response body
    ///
    /// A non-success status is returned as [`ExportError::ApiStatus`] with
    /// the body attached, so callers can inspect it.
    async fn call(&self, request: &ApiRequest<'_>) -> Result<String>;

    /// Stream `url` into `dest` through a temporary file; returns bytes written
    async fn fetch_to(
        &self,
        url: &str,
        session: Option<&Session>,
        keyring: Option<&Keyring>,
        dest: &Path,
    ) -> Result<u64>;

    /// Drop pooled connections and start over with a fresh client
    async fn reconnect(&self) -> Result<()>;
}

/// `reqwest`-backed transport speaking SOAP over HTTPS
///
/// API calls run under `request_timeout`. Asset downloads get their own
/// `download_timeout`, which covers streaming the body to disk.
pub struct HttpTransport {
    client: RwLock<Client>,
    endpoint: String,
    timeout: Duration,
    download_timeout: Duration,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let client = build_client(config.request_timeout, &config.user_agent)?;
        Ok(Self {
            client: RwLock::new(client),
            endpoint: config.api_url.clone(),
            timeout: config.request_timeout,
            download_timeout: config.download_timeout,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn client(&self) -> Client {
        self.client.read().await.clone()
    }
}

// No client-wide deadline: each request sets its own.
fn build_client(connect_timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| ExportError::Configuration {
            message: format!("failed to build HTTP client: {e}"),
            field: None,
        })
}

fn apply_auth(mut builder: RequestBuilder, session: Option<&Session>, keyring: Option<&Keyring>) -> RequestBuilder {
    if let Some(session) = session {
        builder = builder.header(TOKEN_HEADER, session.token());
    }
    if let Some(keyring) = keyring.filter(|k| !k.is_empty()) {
        builder = builder.header(KEYRING_HEADER, keyring.as_str());
    }
    builder
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &ApiRequest<'_>) -> Result<String> {
        let envelope = build_envelope(request.method, &request.fields);
        debug!(method = request.method, "Calling API");

        let builder = self
            .client()
            .await
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header(ACCEPT, "text/xml")
            .header("SOAPAction", soap_action(request.method));
        let response = apply_auth(builder, request.session, request.keyring)
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(method = request.method, status = status.as_u16(), bytes = body.len(), "API response");

        if !status.is_success() {
            return Err(ExportError::ApiStatus {
                action: request.method.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn fetch_to(
        &self,
        url: &str,
        session: Option<&Session>,
        keyring: Option<&Keyring>,
        dest: &Path,
    ) -> Result<u64> {
        let builder = self.client().await.get(url).timeout(self.download_timeout);
        let response = apply_auth(builder, session, keyring)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::DownloadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let temp_path = create_temp_path(dest);
        let written = stream_to_file(response, &temp_path).await;
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    debug!("Could not remove partial file {}: {}", temp_path.display(), cleanup);
                }
                return Err(e);
            }
        };

        atomic_rename(&temp_path, dest).await?;
        debug!("Downloaded {} ({} bytes) to {}", url, size, dest.display());
        Ok(size)
    }

    async fn reconnect(&self) -> Result<()> {
        let fresh = build_client(self.timeout, &self.user_agent)?;
        *self.client.write().await = fresh;
        info!("Rebuilt HTTP client after connection failure");
        Ok(())
    }
}

async fn stream_to_file(response: reqwest::Response, temp_path: &Path) -> Result<u64> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(ExportError::file_system(temp_path, FileOperation::Create))?;

    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk)
            .await
            .map_err(ExportError::file_system(temp_path, FileOperation::Write))?;
        downloaded += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(ExportError::file_system(temp_path, FileOperation::Write))?;
    if downloaded == 0 {
        warn!("Empty response body written to {}", temp_path.display());
    }
    Ok(downloaded)
}
