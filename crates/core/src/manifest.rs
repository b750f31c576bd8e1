//! Ordered manifest of generated artifacts, consumed by video assembly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::GenerationResult;

/// Conventional manifest file name inside a batch output directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Name of the request that produced the artifact.
    pub request: String,
    #[serde(alias = "file")]
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Successful results in index order.
    pub fn from_results(results: &[GenerationResult]) -> Self {
        let mut ok: Vec<&GenerationResult> = results.iter().filter(|r| r.success).collect();
        ok.sort_by_key(|r| r.index);
        let entries = ok
            .into_iter()
            .filter_map(|r| {
                r.output_path.as_ref().map(|path| ManifestEntry {
                    request: r.name.clone(),
                    output_file: path.clone(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn write(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn read(path: &Path) -> Result<Self, CoreError> {
        let json = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&json).map_err(|e| CoreError::Parse {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
