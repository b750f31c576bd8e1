//! Pipeline configuration loaded from environment variables.

use std::path::PathBuf;

use crate::error::CoreError;
use crate::params::Voice;

/// Default narration style for the speech backend.
pub const DEFAULT_TTS_INSTRUCTIONS: &str = "Voice Affect: Dramatic, powerful, and commanding; \
project authority and intensity.\n\n\
Tone: Serious, intense, and compelling; express urgency and importance.\n\n\
Pacing: Varied and dynamic; slower for emphasis on key points, faster for building tension.\n\n\
Emotion: Strong conviction and gravitas; speak with deep resonance and bass.\n\n\
Pronunciation: Clear and precise, emphasizing critical words to reinforce impact.\n\n\
Pauses: Strategic pauses after important statements, creating dramatic effect and allowing \
key points to resonate.";

/// Service endpoints and defaults shared by every command.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Image backend base URL (no trailing slash).
    pub comfyui_url: String,
    /// Speech backend base URL including the `/v1` suffix.
    pub speech_base_url: String,
    pub speech_api_key: Option<String>,
    pub tts_voice: Voice,
    pub tts_instructions: String,
    /// UI- or API-format workflow template for still images.
    pub workflow_path: PathBuf,
    /// Template used by the clip command.
    pub clip_workflow_path: PathBuf,
    pub checkpoint_name: String,
    pub ffmpeg_bin: PathBuf,
}

impl PipelineConfig {
    /// Load from the process environment.
    ///
    /// | Env var | Default |
    /// |---------|---------|
    /// | `COMFYUI_URL` | `http://127.0.0.1:8188` |
    /// | `OPENAI_BASE_URL` | `http://localhost:8000/v1` |
    /// | `OPENAI_API_KEY` | unset |
    /// | `TTS_VOICE` | `onyx` |
    /// | `TTS_INSTRUCTIONS` | dramatic preset |
    /// | `WORKFLOW_PATH` | `workflows/basic_image.json` |
    /// | `CLIP_WORKFLOW_PATH` | `workflows/whiteboard_animation.json` |
    /// | `CHECKPOINT_NAME` | `dreamshaperXL_lightningDPMSDE.safetensors` |
    /// | `FFMPEG_BIN` | `ffmpeg` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (empty values count as unset).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let comfyui_url = parse_url(
            "COMFYUI_URL",
            get("COMFYUI_URL").unwrap_or_else(|| "http://127.0.0.1:8188".into()),
        )?;
        let speech_base_url = parse_url(
            "OPENAI_BASE_URL",
            get("OPENAI_BASE_URL").unwrap_or_else(|| "http://localhost:8000/v1".into()),
        )?;

        let tts_voice = match get("TTS_VOICE") {
            Some(raw) => raw.parse::<Voice>().map_err(|e| CoreError::Config {
                var: "TTS_VOICE",
                message: e.to_string(),
            })?,
            None => Voice::default(),
        };

        Ok(Self {
            comfyui_url,
            speech_base_url,
            speech_api_key: get("OPENAI_API_KEY"),
            tts_voice,
            tts_instructions: get("TTS_INSTRUCTIONS")
                .unwrap_or_else(|| DEFAULT_TTS_INSTRUCTIONS.into()),
            workflow_path: get("WORKFLOW_PATH")
                .unwrap_or_else(|| "workflows/basic_image.json".into())
                .into(),
            clip_workflow_path: get("CLIP_WORKFLOW_PATH")
                .unwrap_or_else(|| "workflows/whiteboard_animation.json".into())
                .into(),
            checkpoint_name: get("CHECKPOINT_NAME")
                .unwrap_or_else(|| "dreamshaperXL_lightningDPMSDE.safetensors".into()),
            ffmpeg_bin: get("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".into()).into(),
        })
    }
}

fn parse_url(var: &'static str, raw: String) -> Result<String, CoreError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CoreError::Config {
            var,
            message: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<PipelineConfig, CoreError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.comfyui_url, "http://127.0.0.1:8188");
        assert_eq!(config.speech_base_url, "http://localhost:8000/v1");
        assert!(config.speech_api_key.is_none());
        assert_eq!(config.tts_voice, Voice::Onyx);
        assert!(config.tts_instructions.starts_with("Voice Affect: Dramatic"));
        assert_eq!(config.workflow_path, PathBuf::from("workflows/basic_image.json"));
        assert_eq!(config.ffmpeg_bin, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn overrides_and_trailing_slash() {
        let config = load(&[
            ("COMFYUI_URL", "http://gpu-box:8188/"),
            ("OPENAI_API_KEY", "sk-test"),
            ("TTS_VOICE", "Nova"),
        ])
        .unwrap();
        assert_eq!(config.comfyui_url, "http://gpu-box:8188");
        assert_eq!(config.speech_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.tts_voice, Voice::Nova);
    }

    #[test]
    fn empty_value_counts_as_unset() {
        let config = load(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.speech_api_key.is_none());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        assert_matches!(
            load(&[("COMFYUI_URL", "gpu-box:8188")]),
            Err(CoreError::Config { var: "COMFYUI_URL", .. })
        );
        assert_matches!(
            load(&[("TTS_VOICE", "baritone")]),
            Err(CoreError::Config { var: "TTS_VOICE", .. })
        );
    }
}
