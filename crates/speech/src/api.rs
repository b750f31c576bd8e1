//! HTTP client for `POST {base}/audio/speech`.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use sketchcast_core::params::Voice;
use tokio::io::AsyncWriteExt;

/// Base URL of the hosted OpenAI API.
pub const OFFICIAL_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used against the hosted API.
pub const OFFICIAL_MODEL: &str = "tts-1";

/// Model name expected by self-hosted compatible servers.
pub const OPEN_SOURCE_MODEL: &str = "gpt-4o-mini-tts";

/// Placeholder key sent to servers that do not check one.
const PLACEHOLDER_API_KEY: &str = "not-needed";

/// Timeout for the `/health` liveness probe.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Which kind of endpoint the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechMode {
    Official,
    OpenSource,
}

/// Errors from the speech API layer.
#[derive(Debug, thiserror::Error)]
pub enum SpeechApiError {
    /// Official mode was selected without an API key.
    #[error("OpenAI API key not found; set OPENAI_API_KEY, pass --api-key, or use --open-source")]
    MissingApiKey,

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Speech API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// Writing the audio stream to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Body of a speech synthesis request.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub voice: Voice,
    pub input: &'a str,
    pub instructions: &'a str,
    pub response_format: &'a str,
}

/// HTTP client for one speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    mode: SpeechMode,
}

impl SpeechApi {
    /// Client for the hosted API. Fails without a key.
    pub fn official(api_key: Option<String>) -> Result<Self, SpeechApiError> {
        Self::official_at(OFFICIAL_BASE_URL, api_key)
    }

    /// Hosted-API client against a custom base URL (proxies, tests).
    pub fn official_at(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, SpeechApiError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(SpeechApiError::MissingApiKey)?;
        Ok(Self::build(base_url.into(), api_key, SpeechMode::Official))
    }

    /// Client for a self-hosted compatible server; no key needed.
    pub fn open_source(base_url: impl Into<String>) -> Self {
        Self::build(
            base_url.into(),
            PLACEHOLDER_API_KEY.to_string(),
            SpeechMode::OpenSource,
        )
    }

    fn build(base_url: String, api_key: String, mode: SpeechMode) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            mode,
        }
    }

    pub fn mode(&self) -> SpeechMode {
        self.mode
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &'static str {
        match self.mode {
            SpeechMode::Official => OFFICIAL_MODEL,
            SpeechMode::OpenSource => OPEN_SOURCE_MODEL,
        }
    }

    /// Synthesize `input` as raw PCM and stream it into `dest`.
    ///
    /// Returns the number of bytes written. On error the partial file is
    /// removed.
    pub async fn synthesize_to_file(
        &self,
        input: &str,
        voice: Voice,
        instructions: &str,
        dest: &Path,
    ) -> Result<u64, SpeechApiError> {
        let body = SpeechRequest {
            model: self.model(),
            voice,
            input,
            instructions,
            response_format: "pcm",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SpeechApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        match stream_to_file(response, dest).await {
            Ok(written) => {
                tracing::debug!(dest = %dest.display(), bytes = written, "Speech audio saved");
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    /// Liveness probe for self-hosted servers: `GET {base without /v1}/health`.
    ///
    /// The hosted API has no health route, so official mode always passes.
    pub async fn health(&self) -> Result<(), SpeechApiError> {
        if self.mode == SpeechMode::Official {
            return Ok(());
        }

        let response = self
            .client
            .get(health_url(&self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechApiError::ApiError {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64, SpeechApiError> {
    let mut out = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}

fn health_url(base_url: &str) -> String {
    let root = base_url.strip_suffix("/v1").unwrap_or(base_url);
    format!("{root}/health")
}
