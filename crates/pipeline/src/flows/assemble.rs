//! Final video assembly from a clips directory or a batch manifest.

use std::path::{Path, PathBuf};

use sketchcast_core::ffmpeg::{collect_clips, Ffmpeg, MediaInput};
use sketchcast_core::manifest::Manifest;

use super::FlowError;

pub const DEFAULT_FPS: u32 = 24;

/// Seconds each still image stays on screen.
pub const DEFAULT_IMAGE_DURATION: f64 = 5.0;

/// Where the ordered media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblySource {
    /// Every `*.mp4` then `*.mov` in the directory, each sorted by name.
    Clips(PathBuf),
    /// Entries of a `manifest.json`, in order; missing files are skipped.
    Manifest(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblySettings {
    pub fps: u32,
    pub image_duration: f64,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            image_duration: DEFAULT_IMAGE_DURATION,
        }
    }
}

/// Resolve `source` into concat inputs.
pub async fn collect_inputs(
    source: &AssemblySource,
    image_duration: f64,
) -> Result<Vec<MediaInput>, FlowError> {
    let (paths, origin) = match source {
        AssemblySource::Clips(dir) => (collect_clips(dir).await?, dir),
        AssemblySource::Manifest(path) => (manifest_files(path).await?, path),
    };

    if paths.is_empty() {
        return Err(FlowError::NoMedia(origin.display().to_string()));
    }
    Ok(paths
        .into_iter()
        .map(|p| MediaInput::from_path(p, image_duration))
        .collect())
}

/// Assemble `source` (plus optional voiceover) into `output`.
///
/// Returns the number of media inputs used.
pub async fn assemble(
    ffmpeg: &Ffmpeg,
    source: &AssemblySource,
    voiceover: Option<&Path>,
    output: &Path,
    settings: &AssemblySettings,
) -> Result<usize, FlowError> {
    let version = ffmpeg.check_available().await?;
    tracing::debug!(%version, "ffmpeg available");

    let inputs = collect_inputs(source, settings.image_duration).await?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    ffmpeg
        .assemble_video(&inputs, voiceover, output, settings.fps)
        .await?;
    Ok(inputs.len())
}

// ---- private helpers ----

/// Existing manifest files in entry order. Relative paths are tried as
/// given, then relative to the manifest's directory.
async fn manifest_files(manifest_path: &Path) -> Result<Vec<PathBuf>, FlowError> {
    let manifest = Manifest::read(manifest_path).await?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut files = Vec::with_capacity(manifest.entries.len());
    for entry in manifest.entries {
        let candidates = [entry.output_file.clone(), base.join(&entry.output_file)];
        let mut found = None;
        for candidate in candidates {
            if tokio::fs::try_exists(&candidate).await? {
                found = Some(candidate);
                break;
            }
        }
        match found {
            Some(path) => files.push(path),
            None => tracing::warn!(
                request = %entry.request,
                file = %entry.output_file.display(),
                "Manifest entry missing on disk, skipping",
            ),
        }
    }
    Ok(files)
}
