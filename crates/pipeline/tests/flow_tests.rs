//! Voiceover and scene flows against the in-memory backend.

mod common;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;
use common::{Behavior, FakeBackend};
use sketchcast_core::ffmpeg::Ffmpeg;
use sketchcast_core::script::Scene;
use sketchcast_pipeline::dispatcher::{DispatchError, Dispatcher, PollPolicy};
use sketchcast_pipeline::flows::images::ImageSettings;
use sketchcast_pipeline::flows::scenes::run_scenes;
use sketchcast_pipeline::flows::voiceover::{generate_voiceover, scratch_dir_for, VoiceSettings};
use sketchcast_pipeline::flows::FlowError;

fn scene(number: u32, voice_over: &str) -> Scene {
    Scene {
        scene_number: number,
        visual_prompt: format!("scene {number} drawing"),
        voice_over: voice_over.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Test: voiceover
// ---------------------------------------------------------------------------

/// A single chunk is moved into place and the scratch directory removed.
#[tokio::test]
async fn single_chunk_voiceover_is_renamed() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("narration.mp3");
    let scratch = scratch_dir_for(&output);
    let d = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Immediate).writing_to(&scratch)),
        PollPolicy::BATCH_IMAGE,
    );

    let outcome = generate_voiceover(
        &d,
        &Ffmpeg::new("/nonexistent/ffmpeg"),
        "A short narration.",
        &output,
        &VoiceSettings::default(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.chunks, 1);
    assert!(output.exists());
    assert!(!scratch.exists());
}

/// A failed chunk removes the chunks that succeeded and merges nothing.
#[tokio::test]
async fn failed_chunk_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("narration.mp3");
    let scratch = scratch_dir_for(&output);
    let backend = FakeBackend::new(Behavior::Immediate)
        .with(1, Behavior::SubmitError)
        .writing_to(&scratch);
    let d = Dispatcher::new(Arc::new(backend), PollPolicy::BATCH_IMAGE);
    let settings = VoiceSettings {
        max_chars: 100,
        overlap: 0,
        ..VoiceSettings::default()
    };
    let text = "This sentence is about forty chars long. ".repeat(6);

    let result = generate_voiceover(
        &d,
        &Ffmpeg::new("/nonexistent/ffmpeg"),
        &text,
        &output,
        &settings,
    )
    .await;

    assert_matches!(result, Err(FlowError::ChunksFailed { failed: 1, total, .. }) if total >= 3);
    assert!(!output.exists());
    assert!(!scratch.join("chunk_001.out").exists());
    assert!(!scratch.join("chunk_003.out").exists());
}

#[tokio::test]
async fn empty_narration_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let d = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Immediate)),
        PollPolicy::BATCH_IMAGE,
    );

    let result = generate_voiceover(
        &d,
        &Ffmpeg::default(),
        "   \n",
        &dir.path().join("out.mp3"),
        &VoiceSettings::default(),
    )
    .await;

    assert_matches!(result, Err(FlowError::Core(_)));
    assert_eq!(d.backend().submits.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Test: scenes
// ---------------------------------------------------------------------------

/// Scenes continue past a failed image, which skips that scene's voice.
#[tokio::test(start_paused = true)]
async fn failed_image_skips_scene_voice() {
    let images = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Succeed { polls: 1 })),
        PollPolicy::BATCH_IMAGE,
    );
    let voices = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Immediate)),
        PollPolicy::BATCH_IMAGE,
    );

    // Scene images are always index 0 of their own batch.
    let failing_images = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Reject("API error: bad node"))),
        PollPolicy::BATCH_IMAGE,
    );

    let ok = run_scenes(
        &images,
        &voices,
        &[scene(1, "First line. Second line."), scene(2, "")],
        &ImageSettings::batch(),
        &VoiceSettings::default(),
    )
    .await
    .unwrap();

    assert_eq!(ok.len(), 2);
    assert!(ok.iter().all(|o| o.success()));
    assert_eq!(ok[0].image.output_path.as_deref(), Some(Path::new("scene_1.out")));
    assert_eq!(ok[0].voice.len(), 1);
    assert_eq!(
        ok[0].voice[0].output_path.as_deref(),
        Some(Path::new("voice_scene_1_A.out"))
    );
    assert!(ok[1].voice.is_empty(), "empty narration yields no chunks");

    let failed = run_scenes(
        &failing_images,
        &voices,
        &[scene(3, "Narration.")],
        &ImageSettings::batch(),
        &VoiceSettings::default(),
    )
    .await
    .unwrap();

    assert!(!failed[0].success());
    assert!(failed[0].voice.is_empty());
    assert_eq!(voices.backend().submits.load(Ordering::SeqCst), 1);
}

/// Either service being down aborts before any scene runs.
#[tokio::test]
async fn scenes_check_both_services_first() {
    let images = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Immediate)),
        PollPolicy::BATCH_IMAGE,
    );
    let voices = Dispatcher::new(
        Arc::new(FakeBackend::new(Behavior::Immediate).unhealthy()),
        PollPolicy::BATCH_IMAGE,
    );

    let result = run_scenes(
        &images,
        &voices,
        &[scene(1, "Hello.")],
        &ImageSettings::batch(),
        &VoiceSettings::default(),
    )
    .await;

    assert_matches!(
        result,
        Err(FlowError::Dispatch(DispatchError::ServiceUnavailable { .. }))
    );
    assert_eq!(images.backend().submits.load(Ordering::SeqCst), 0);
}
