//! Shared request/result model passed between the dispatcher and backends.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::naming::ArtifactNaming;
use crate::params::Voice;
use crate::resolution::Resolution;

/// Sampling parameters for one image (or clip) generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    pub resolution: Resolution,
    pub steps: u32,
    pub cfg_scale: f32,
    /// Concrete seed; random seeds are resolved before the request is built.
    pub seed: u64,
    /// Latent batch size. `1` for stills, the frame count for clips.
    pub batch_size: u32,
}

/// What a request asks the backend to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Image {
        prompt: String,
        negative_prompt: String,
        params: ImageParams,
    },
    Speech {
        text: String,
        voice: Voice,
        instructions: String,
    },
}

/// One unit of work for the dispatcher.
///
/// `index` is the stable ordering key: results are returned sorted by it
/// and the artifact stem is derived from it, never from `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub index: usize,
    pub name: String,
    /// Artifact file stem (no extension).
    pub stem: String,
    pub payload: Payload,
}

impl GenerationRequest {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        naming: ArtifactNaming,
        payload: Payload,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            stem: naming.stem(index),
            payload,
        }
    }

    /// Override the derived stem (used for one-off sketches with a
    /// caller-chosen file name).
    pub fn with_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = stem.into();
        self
    }
}

/// Opaque job identifier returned by a remote queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one request. Exactly one is produced per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub index: usize,
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(request: &GenerationRequest, output_path: PathBuf) -> Self {
        Self {
            index: request.index,
            name: request.name.clone(),
            success: true,
            output_path: Some(output_path),
            error: None,
        }
    }

    pub fn failed(request: &GenerationRequest, error: impl Into<String>) -> Self {
        Self {
            index: request.index,
            name: request.name.clone(),
            success: false,
            output_path: None,
            error: Some(error.into()),
        }
    }
}
