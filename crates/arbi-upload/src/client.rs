use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::payload::UploadPayload;

/// Default request timeout for uploads.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload client errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The endpoint is not an absolute http(s) URL.
    #[error("invalid upload endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: String,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The gateway already holds this run.
    #[error("{0}")]
    Duplicate(String),
    /// The gateway refused the run.
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Posts run payloads to a gateway.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    origin: String,
}

impl UploadClient {
    /// Creates a client for `endpoint`, sending `origin` as the `Origin` header.
    pub fn new(endpoint: &str, origin: impl Into<String>) -> Result<Self, UploadError> {
        let invalid = |reason: String| UploadError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let url = reqwest::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(UploadError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint: url,
            origin: origin.into(),
        })
    }

    pub const fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    /// Uploads a payload and returns the gateway's confirmation message.
    pub async fn upload(&self, payload: &UploadPayload) -> Result<String, UploadError> {
        tracing::debug!(endpoint = %self.endpoint, mission = %payload.mission_name, "uploading run");
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::ORIGIN, &self.origin)
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_response(status, &body)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GatewayReply {
    message: Option<String>,
    error: Option<String>,
}

fn interpret_response(status: u16, body: &str) -> Result<String, UploadError> {
    let reply: Option<GatewayReply> = serde_json::from_str(body).ok();
    match status {
        200..=299 => reply
            .and_then(|r| r.message)
            .ok_or_else(|| UploadError::InvalidResponse(format!("missing message in {body:?}"))),
        409 => Err(UploadError::Duplicate(
            reply
                .and_then(|r| r.error)
                .unwrap_or_else(|| "run already uploaded".to_string()),
        )),
        _ => Err(UploadError::Rejected {
            status,
            message: reply
                .and_then(|r| r.error)
                .unwrap_or_else(|| body.trim().to_string()),
        }),
    }
}
