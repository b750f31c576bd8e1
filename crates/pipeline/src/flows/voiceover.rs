//! Long-form narration: chunk, synthesize each chunk, merge into one MP3.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sketchcast_core::chunking::{chunk_text, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP};
use sketchcast_core::error::CoreError;
use sketchcast_core::ffmpeg::Ffmpeg;
use sketchcast_core::naming::ArtifactNaming;
use sketchcast_core::params::Voice;
use sketchcast_core::types::{GenerationRequest, GenerationResult, Payload};

use super::FlowError;
use crate::backend::GenerationBackend;
use crate::dispatcher::{Dispatcher, ExecutionMode};

/// Directory name, next to the output file, that holds chunk files
/// until they are merged.
pub const SCRATCH_DIR_NAME: &str = "temp_voiceover";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub voice: Voice,
    pub instructions: String,
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            instructions: String::new(),
            max_chars: DEFAULT_MAX_CHARS,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Scratch directory used for `output`.
pub fn scratch_dir_for(output: &Path) -> PathBuf {
    output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SCRATCH_DIR_NAME)
}

/// One speech request per chunk of `text`, named by `naming`.
pub fn speech_requests(
    text: &str,
    settings: &VoiceSettings,
    naming: ArtifactNaming,
) -> Result<Vec<GenerationRequest>, CoreError> {
    let chunks = chunk_text(text, settings.max_chars, settings.overlap)?;
    Ok(chunks
        .into_iter()
        .map(|chunk| {
            let name = format!("chunk {}", chunk.label());
            GenerationRequest::new(
                chunk.ordinal,
                name,
                naming,
                Payload::Speech {
                    text: chunk.text,
                    voice: settings.voice,
                    instructions: settings.instructions.clone(),
                },
            )
        })
        .collect())
}

/// Summary of a finished voiceover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceoverOutcome {
    pub output: PathBuf,
    pub chunks: usize,
}

/// Synthesize `text` chunk by chunk and merge the chunks into `output`.
///
/// `dispatcher`'s backend must write into [`scratch_dir_for`]`(output)`.
/// If any chunk fails, the chunks that did succeed are deleted and
/// nothing is merged.
pub async fn generate_voiceover<B: GenerationBackend>(
    dispatcher: &Dispatcher<B>,
    ffmpeg: &Ffmpeg,
    text: &str,
    output: &Path,
    settings: &VoiceSettings,
) -> Result<VoiceoverOutcome, FlowError> {
    let requests = speech_requests(text, settings, ArtifactNaming::VoiceChunk)?;
    if requests.is_empty() {
        return Err(CoreError::Validation("Narration text is empty".to_string()).into());
    }
    let total = requests.len();
    tracing::info!(chunks = total, max_chars = settings.max_chars, "Generating voiceover");

    let results = dispatcher
        .run(
            requests,
            ExecutionMode::Sequential {
                delay: Duration::ZERO,
            },
        )
        .await?;

    let scratch = scratch_dir_for(output);
    let paths = match successful_paths(&results) {
        Ok(paths) => paths,
        Err(first_error) => {
            remove_outputs(&results).await;
            // Left in place if a kept PCM file is still inside.
            let _ = tokio::fs::remove_dir(&scratch).await;
            return Err(FlowError::ChunksFailed {
                failed: results.iter().filter(|r| !r.success).count(),
                total,
                first_error,
            });
        }
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    ffmpeg.concat_audio(&paths, output).await?;

    if tokio::fs::try_exists(&scratch).await? {
        tokio::fs::remove_dir_all(&scratch).await?;
    }

    tracing::info!(output = %output.display(), chunks = total, "Voiceover complete");
    Ok(VoiceoverOutcome {
        output: output.to_path_buf(),
        chunks: total,
    })
}

/// Output paths in index order, or the first error message.
fn successful_paths(results: &[GenerationResult]) -> Result<Vec<PathBuf>, String> {
    results
        .iter()
        .map(|r| match (&r.output_path, r.success) {
            (Some(path), true) => Ok(path.clone()),
            _ => Err(format!(
                "{}: {}",
                r.name,
                r.error.as_deref().unwrap_or("no output")
            )),
        })
        .collect()
}

pub(crate) async fn remove_outputs(results: &[GenerationResult]) {
    for path in results.iter().filter_map(|r| r.output_path.as_ref()) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove chunk file");
        }
    }
}
