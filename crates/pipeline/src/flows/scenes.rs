//! Scripted scenes: one sketch plus its narration chunks per scene.
//!
//! Scenes run one after another. A scene whose image fails skips its
//! voice work; a failing scene never stops the ones after it.

use std::time::Duration;

use serde::Serialize;
use sketchcast_core::naming::ArtifactNaming;
use sketchcast_core::script::Scene;
use sketchcast_core::types::GenerationResult;

use super::images::{scene_image_request, ImageSettings};
use super::voiceover::{speech_requests, VoiceSettings};
use super::FlowError;
use crate::backend::GenerationBackend;
use crate::dispatcher::{Dispatcher, ExecutionMode};

/// Pause between consecutive scenes.
pub const SCENE_DELAY: Duration = Duration::from_secs(3);

/// Narration chunk length for scenes (no overlap).
pub const SCENE_VOICE_CHUNK_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneOutcome {
    pub scene_number: u32,
    pub image: GenerationResult,
    /// Empty when the image failed or the scene has no narration.
    pub voice: Vec<GenerationResult>,
}

impl SceneOutcome {
    /// The image and every voice chunk succeeded.
    pub fn success(&self) -> bool {
        self.image.success && self.voice.iter().all(|r| r.success)
    }
}

/// Voice settings with the scene chunking applied.
pub fn scene_voice_settings(base: &VoiceSettings) -> VoiceSettings {
    VoiceSettings {
        max_chars: SCENE_VOICE_CHUNK_CHARS,
        overlap: 0,
        ..base.clone()
    }
}

/// Generate every scene, probing both services once up front.
pub async fn run_scenes<I, S>(
    images: &Dispatcher<I>,
    voices: &Dispatcher<S>,
    scenes: &[Scene],
    image_settings: &ImageSettings,
    voice_settings: &VoiceSettings,
) -> Result<Vec<SceneOutcome>, FlowError>
where
    I: GenerationBackend,
    S: GenerationBackend,
{
    images.preflight().await?;
    voices.preflight().await?;

    let voice_settings = scene_voice_settings(voice_settings);
    let mut outcomes = Vec::with_capacity(scenes.len());

    for (position, scene) in scenes.iter().enumerate() {
        tracing::info!(
            scene = scene.scene_number,
            position = position + 1,
            total = scenes.len(),
            "Processing scene",
        );
        let outcome = run_scene(images, voices, scene, image_settings, &voice_settings).await?;
        if !outcome.success() {
            tracing::warn!(scene = scene.scene_number, "Scene failed");
        }
        outcomes.push(outcome);

        if position + 1 < scenes.len() {
            tokio::time::sleep(SCENE_DELAY).await;
        }
    }
    Ok(outcomes)
}

async fn run_scene<I, S>(
    images: &Dispatcher<I>,
    voices: &Dispatcher<S>,
    scene: &Scene,
    image_settings: &ImageSettings,
    voice_settings: &VoiceSettings,
) -> Result<SceneOutcome, FlowError>
where
    I: GenerationBackend,
    S: GenerationBackend,
{
    let single = ExecutionMode::Sequential {
        delay: Duration::ZERO,
    };

    let request = scene_image_request(scene, image_settings);
    let image = images
        .dispatch(vec![request.clone()], single)
        .await?
        .pop()
        .unwrap_or_else(|| GenerationResult::failed(&request, "No result for scene image"));

    if !image.success {
        return Ok(SceneOutcome {
            scene_number: scene.scene_number,
            image,
            voice: Vec::new(),
        });
    }

    let requests = speech_requests(
        &scene.voice_over,
        voice_settings,
        ArtifactNaming::SceneVoice(scene.scene_number),
    )?;
    let voice = if requests.is_empty() {
        Vec::new()
    } else {
        voices.dispatch(requests, single).await?
    };

    Ok(SceneOutcome {
        scene_number: scene.scene_number,
        image,
        voice,
    })
}
