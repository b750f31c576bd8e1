//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval, artifact download and
//! the liveness probe using [`reqwest`].

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use sketchcast_core::types::JobHandle;
use tokio::io::AsyncWriteExt;

use crate::history::{HistoryEntry, OutputFile};

/// Timeout for the `/system_stats` liveness probe.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Folder type requested from `/view`; generated artifacts live in `output`.
const VIEW_FOLDER_TYPE: &str = "output";

/// Maximum characters of node-error detail kept in a rejection message.
pub const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Result of `POST /prompt`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The workflow was queued under this handle.
    Queued(JobHandle),
    /// ComfyUI refused the workflow (validation or node errors).
    Rejected(Rejection),
}

/// Error payload returned by ComfyUI when a workflow fails validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub message: String,
    /// Per-node validation errors, when present and non-empty.
    pub node_errors: Option<serde_json::Value>,
}

impl Rejection {
    /// Human-readable description, with node errors truncated to
    /// [`MAX_ERROR_DETAIL_CHARS`].
    pub fn describe(&self) -> String {
        match &self.node_errors {
            Some(details) => {
                let pretty = serde_json::to_string_pretty(details).unwrap_or_default();
                let truncated: String = pretty.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
                format!("API error: {}\nDetails: {truncated}", self.message)
            }
            None => format!("API error: {}", self.message),
        }
    }
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),

    /// Writing a downloaded artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw `/prompt` response body; either a queue receipt or an error.
#[derive(Debug, Deserialize)]
struct PromptResponse {
    prompt_id: Option<String>,
    number: Option<i64>,
    error: Option<PromptError>,
    node_errors: Option<serde_json::Value>,
}

/// `error` is usually an object with `message`, occasionally a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromptError {
    Detailed { message: Option<String> },
    Plain(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the API-format workflow and client ID.
    /// A validation error payload is returned as
    /// [`SubmitOutcome::Rejected`], whatever the HTTP status; the queue
    /// handle is `prompt_id`, falling back to the queue `number`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitOutcome, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        let parsed = match serde_json::from_str::<PromptResponse>(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ComfyUIApiError::ApiError {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(_) => return Err(ComfyUIApiError::UnexpectedResponse(text)),
        };

        if let Some(error) = parsed.error {
            let message = match error {
                PromptError::Detailed { message } => {
                    message.unwrap_or_else(|| "Unknown error".to_string())
                }
                PromptError::Plain(message) => message,
            };
            let node_errors = parsed.node_errors.filter(|v| match v {
                serde_json::Value::Object(map) => !map.is_empty(),
                serde_json::Value::Null => false,
                _ => true,
            });
            return Ok(SubmitOutcome::Rejected(Rejection {
                message,
                node_errors,
            }));
        }

        if !status.is_success() {
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        match (parsed.prompt_id, parsed.number) {
            (Some(id), _) if !id.is_empty() => Ok(SubmitOutcome::Queued(JobHandle(id))),
            (_, Some(number)) => Ok(SubmitOutcome::Queued(JobHandle(number.to_string()))),
            _ => Err(ComfyUIApiError::UnexpectedResponse(text)),
        }
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. Returns `None` while the prompt
    /// has no history record yet (still queued or running).
    pub async fn get_history(
        &self,
        handle: &JobHandle,
    ) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, handle))
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;
        HistoryEntry::from_history(&body, handle)
            .map_err(|e| ComfyUIApiError::UnexpectedResponse(e.to_string()))
    }

    /// Stream an output file from `GET /view` into `dest`.
    ///
    /// Returns the number of bytes written.
    pub async fn download(&self, file: &OutputFile, dest: &Path) -> Result<u64, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", file.filename.as_str()),
                ("subfolder", file.subfolder.as_str()),
                ("type", VIEW_FOLDER_TYPE),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;

        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        tracing::debug!(
            filename = %file.filename,
            dest = %dest.display(),
            bytes = written,
            "Downloaded output",
        );
        Ok(written)
    }

    /// Liveness probe: `GET /system_stats` with a short timeout.
    pub async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_without_details() {
        let rejection = Rejection {
            message: "Prompt outputs failed validation".into(),
            node_errors: None,
        };
        assert_eq!(rejection.describe(), "API error: Prompt outputs failed validation");
    }

    #[test]
    fn rejection_details_are_truncated() {
        let rejection = Rejection {
            message: "bad".into(),
            node_errors: Some(serde_json::json!({ "5": { "errors": "x".repeat(2000) } })),
        };
        let text = rejection.describe();
        let details = text.split_once("\nDetails: ").unwrap().1;
        assert_eq!(details.chars().count(), MAX_ERROR_DETAIL_CHARS);
        assert!(text.starts_with("API error: bad"));
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        assert_eq!(ComfyUIApi::new("http://h:8188/").api_url(), "http://h:8188");
    }
}
