//! Cloud Conversion Client
//!
//! Submits a batch of public image URLs to a remote conversion service in a
//! single request and writes the returned AVIF payloads next to their sources.
//!
//! Request (`POST {endpoint}`, bearer auth when a key is configured):
//! `{ "urls": [...], "quality": 80, "speed": 6, "format": "avif" }`
//!
//! Response: `{ "status": "ok" | "fail" | "over", "files": [{ "url", "data" }] }`
//! where `data` is the base64-encoded converted image. HTTP 402 also means the
//! account quota is used up.

use super::local::partial_path;
use super::{CloudConverter, CloudJob, RemoteResult};
use crate::error::ConvertError;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default request timeout; a full batch is converted server-side before replying
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    urls: Vec<&'a str>,
    quality: u8,
    speed: u8,
    format: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ResponseStatus {
    Ok,
    #[serde(alias = "ccfail")]
    Fail,
    #[serde(alias = "ccover")]
    Over,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    status: ResponseStatus,
    #[serde(default)]
    files: Vec<ConvertedFile>,
}

#[derive(Debug, Deserialize)]
struct ConvertedFile {
    url: String,
    data: String,
}

/// Blocking HTTP client for the conversion service
pub struct HttpCloudConverter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    quality: u8,
    speed: u8,
}

impl HttpCloudConverter {
    /// Create a client for `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConvertError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            quality: 80,
            speed: 6,
        })
    }

    /// Set the encoder parameters forwarded to the service
    pub fn with_encoding(mut self, quality: u8, speed: u8) -> Self {
        self.quality = quality;
        self.speed = speed;
        self
    }

    fn submit(&self, jobs: &[CloudJob]) -> Result<ConvertResponse, SubmitError> {
        let body = ConvertRequest {
            urls: jobs.iter().map(|job| job.url.as_str()).collect(),
            quality: self.quality,
            speed: self.speed,
            format: "avif",
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(SubmitError::Transport)?;
        let status = response.status();

        if let Some(result) = classify_status(status) {
            let text = response.text().unwrap_or_default();
            return Err(SubmitError::Rejected { status, result, text });
        }

        response.json().map_err(SubmitError::Transport)
    }
}

enum SubmitError {
    Transport(reqwest::Error),
    Rejected {
        status: StatusCode,
        result: RemoteResult,
        text: String,
    },
}

impl CloudConverter for HttpCloudConverter {
    fn convert_batch(&self, jobs: &[CloudJob]) -> RemoteResult {
        if jobs.is_empty() {
            return RemoteResult::Ok;
        }

        tracing::info!(
            endpoint = %self.endpoint,
            files = jobs.len(),
            "[CloudConverter] Submitting batch"
        );

        match self.submit(jobs) {
            Ok(response) => apply_response(jobs, response),
            Err(SubmitError::Transport(e)) => {
                tracing::warn!("[CloudConverter] Request failed: {}", e);
                RemoteResult::EngineFailure
            }
            Err(SubmitError::Rejected { status, result, text }) => {
                tracing::warn!(
                    status = status.as_u16(),
                    "[CloudConverter] Service rejected batch: {}",
                    text
                );
                result
            }
        }
    }
}

/// Map a non-success HTTP status to a batch result; `None` for success
fn classify_status(status: StatusCode) -> Option<RemoteResult> {
    if status.is_success() {
        None
    } else if status == StatusCode::PAYMENT_REQUIRED {
        Some(RemoteResult::QuotaExceeded)
    } else {
        Some(RemoteResult::EngineFailure)
    }
}

/// Write returned payloads to their destinations and produce the batch result.
///
/// Files the service left out stay unconverted and are picked up by the next
/// sweep; a payload that cannot be decoded or written fails the batch.
fn apply_response(jobs: &[CloudJob], response: ConvertResponse) -> RemoteResult {
    match response.status {
        ResponseStatus::Fail => return RemoteResult::EngineFailure,
        ResponseStatus::Over => return RemoteResult::QuotaExceeded,
        ResponseStatus::Ok => {}
    }

    let mut written = 0usize;
    for file in &response.files {
        let Some(job) = jobs.iter().find(|job| job.url == file.url) else {
            tracing::warn!(url = %file.url, "[CloudConverter] Response for unknown URL");
            continue;
        };

        let bytes = match STANDARD.decode(file.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %file.url, "[CloudConverter] Bad payload: {}", e);
                return RemoteResult::EngineFailure;
            }
        };

        if let Err(e) = write_output(&job.destination, &bytes) {
            tracing::warn!(
                destination = %job.destination.display(),
                "[CloudConverter] Failed to write output: {}",
                e
            );
            return RemoteResult::EngineFailure;
        }
        written += 1;
    }

    if written < jobs.len() {
        tracing::warn!(
            requested = jobs.len(),
            written,
            "[CloudConverter] Service returned fewer files than requested"
        );
    }

    RemoteResult::Ok
}

/// Write via a sibling `.part` file and rename into place
fn write_output(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(destination);
    fs::write(&partial, bytes)?;
    fs::rename(&partial, destination).inspect_err(|_| {
        let _ = fs::remove_file(&partial);
    })
}
