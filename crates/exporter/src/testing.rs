//! Test fixtures: canned service responses and a scripted transport

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::auth::Session;
use crate::api::envelope::API_NAMESPACE;
use crate::api::keyring::Keyring;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::{ExportError, Result};

/// Wrap `inner` as the `<method>Result` of a SOAP response
pub(crate) fn soap_response(method: &str, inner: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\"><soap:Body>\
         <{method}Response xmlns=\"{API_NAMESPACE}\"><{method}Result>{inner}</{method}Result></{method}Response>\
         </soap:Body></soap:Envelope>"
    )
}

/// One `<Photo>` element of a listing batch
pub(crate) fn photo_xml(id: i64, url: &str, file_name: &str, mime: &str) -> String {
    format!(
        "<Photo><Id>{id}</Id><FileName>{file_name}</FileName><Caption>caption {id}</Caption>\
         <MimeType>{mime}</MimeType><OriginalUrl>{url}</OriginalUrl></Photo>"
    )
}

/// Listing response holding `count` JPEG items numbered from `first_id`
pub(crate) fn batch_response(base_url: &str, first_id: i64, count: usize) -> String {
    let photos: String = (0..count as i64)
        .map(|i| {
            let id = first_id + i;
            photo_xml(id, &format!("{base_url}/media/{id}.jpg"), &format!("IMG_{id}.jpg"), "image/jpeg")
        })
        .collect();
    soap_response("LoadPhotoSetPhotos", &photos)
}

pub(crate) fn api_failure(action: &str, status: u16, body: &str) -> ExportError {
    ExportError::ApiStatus {
        action: action.to_string(),
        status,
        body: body.to_string(),
    }
}

/// Owned copy of a request seen by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub fields: Vec<(&'static str, String)>,
    pub keyring: Option<String>,
}

/// Transport answering calls from a fixed queue of results
///
/// Once the queue is drained every further call fails with HTTP 500.
/// Asset fetches write a few bytes unless the URL contains `fail`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    fetched: Mutex<Vec<String>>,
    reconnects: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: &ApiRequest<'_>) -> Result<String> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            fields: request.fields.clone(),
            keyring: request.keyring.map(|k| k.as_str().to_string()),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_failure(request.method, 500, "script exhausted")))
    }

    async fn fetch_to(
        &self,
        url: &str,
        _session: Option<&Session>,
        _keyring: Option<&Keyring>,
        dest: &Path,
    ) -> Result<u64> {
        self.fetched.lock().unwrap().push(url.to_string());
        if url.contains("fail") {
            return Err(ExportError::DownloadStatus {
                url: url.to_string(),
                status: 404,
            });
        }
        std::fs::write(dest, b"asset")?;
        Ok(5)
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
