//! Artifact naming convention engine.
//!
//! Output files are named from the request index, never from the
//! request name, so names are filesystem-safe, unique within a batch,
//! and sort in submission order.

use crate::chunking::ordinal_label;

/// Naming scheme applied to every artifact a backend persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactNaming {
    /// Batch images: `scene-1`, `scene-2`, ... (1-based from the index).
    SceneSequence,
    /// The single image of a numbered script scene: `scene_{n}`.
    Scene(u32),
    /// Scripted clips: `clip_001`, `clip_002`, ...
    ClipSequence,
    /// Voiceover chunks: `chunk_001`, `chunk_002`, ...
    VoiceChunk,
    /// Voice chunks of a numbered script scene: `voice_scene_{n}_A`, ...
    SceneVoice(u32),
}

impl ArtifactNaming {
    /// File stem (no extension) for the request at `index`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sketchcast_core::naming::ArtifactNaming;
    ///
    /// assert_eq!(ArtifactNaming::SceneSequence.stem(0), "scene-1");
    /// assert_eq!(ArtifactNaming::Scene(7).stem(0), "scene_7");
    /// assert_eq!(ArtifactNaming::ClipSequence.stem(0), "clip_001");
    /// assert_eq!(ArtifactNaming::VoiceChunk.stem(4), "chunk_005");
    /// assert_eq!(ArtifactNaming::SceneVoice(3).stem(1), "voice_scene_3_B");
    /// ```
    pub fn stem(&self, index: usize) -> String {
        match self {
            Self::SceneSequence => format!("scene-{}", index + 1),
            Self::Scene(number) => format!("scene_{number}"),
            Self::ClipSequence => format!("clip_{:03}", index + 1),
            Self::VoiceChunk => format!("chunk_{:03}", index + 1),
            Self::SceneVoice(number) => format!("voice_scene_{number}_{}", ordinal_label(index)),
        }
    }

    /// Full file name: stem plus `extension` (with or without a leading dot).
    pub fn file_name(&self, index: usize, extension: &str) -> String {
        let ext = extension.trim_start_matches('.');
        if ext.is_empty() {
            self.stem(index)
        } else {
            format!("{}.{ext}", self.stem(index))
        }
    }
}

/// Default stem for a one-off artifact when the caller gives no file name,
/// e.g. `sketch_a_cat` for prefix `sketch` and prompt `"a cat"`.
///
/// Keeps alphanumerics, spaces, `-` and `_` from the first 30 characters
/// of the prompt, then replaces spaces with underscores.
pub fn stem_from_prompt(prefix: &str, prompt: &str) -> String {
    let safe: String = prompt
        .chars()
        .take(30)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    format!("{prefix}_{}", safe.trim().replace(' ', "_"))
}
