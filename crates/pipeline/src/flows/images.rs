//! Request builders for still images and animated clips.

use std::path::Path;

use sketchcast_core::clip_script::{ClipLine, CLIP_NEGATIVE_PROMPT};
use sketchcast_core::error::CoreError;
use sketchcast_core::naming::{stem_from_prompt, ArtifactNaming};
use sketchcast_core::params::Seed;
use sketchcast_core::prompts::{
    build_sketch_prompt, PromptEntry, SketchStyle, BATCH_NEGATIVE_PROMPT, SKETCH_NEGATIVE_PROMPT,
};
use sketchcast_core::resolution::Resolution;
use sketchcast_core::script::Scene;
use sketchcast_core::types::{GenerationRequest, ImageParams, Payload};

/// Frame rate clips are generated at; duration is converted with it.
pub const CLIP_FPS: u32 = 24;

/// Sampling settings shared by every request of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub resolution: Resolution,
    pub steps: u32,
    pub cfg_scale: f32,
    pub seed: Seed,
    pub style: SketchStyle,
}

impl ImageSettings {
    /// One-off sketch and clip defaults: 768x768, 25 steps, cfg 7.5.
    pub fn single() -> Self {
        Self {
            resolution: Resolution {
                width: 768,
                height: 768,
            },
            steps: 25,
            cfg_scale: 7.5,
            seed: Seed::Random,
            style: SketchStyle::Sketch,
        }
    }

    /// Batch and scene defaults: 1024x768, 20 steps, cfg 7.0.
    pub fn batch() -> Self {
        Self {
            resolution: Resolution {
                width: 1024,
                height: 768,
            },
            steps: 20,
            cfg_scale: 7.0,
            seed: Seed::Random,
            style: SketchStyle::Sketch,
        }
    }

    /// Concrete parameters; a random seed is drawn per call.
    fn params(&self, batch_size: u32) -> ImageParams {
        ImageParams {
            resolution: self.resolution,
            steps: self.steps,
            cfg_scale: self.cfg_scale,
            seed: self.seed.resolve(),
            batch_size,
        }
    }

    fn sketch_payload(&self, prompt: &str, negative_prompt: &str) -> Payload {
        Payload::Image {
            prompt: build_sketch_prompt(prompt, self.style),
            negative_prompt: negative_prompt.to_string(),
            params: self.params(1),
        }
    }
}

/// A single sketch saved as `filename` (extension ignored) or as
/// `sketch_<prompt prefix>`.
pub fn sketch_request(
    prompt: &str,
    negative_prompt: Option<&str>,
    filename: Option<&str>,
    settings: &ImageSettings,
) -> GenerationRequest {
    let stem = filename
        .and_then(|f| Path::new(f).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| stem_from_prompt("sketch", prompt));

    GenerationRequest::new(
        0,
        prompt,
        ArtifactNaming::SceneSequence,
        settings.sketch_payload(prompt, negative_prompt.unwrap_or(SKETCH_NEGATIVE_PROMPT)),
    )
    .with_stem(stem)
}

/// One request per prompts-file entry, named `scene-1`, `scene-2`, ...
/// in file order. Each random seed is drawn independently.
pub fn batch_requests(
    entries: &[PromptEntry],
    settings: &ImageSettings,
) -> Vec<GenerationRequest> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            GenerationRequest::new(
                index,
                entry.name.clone(),
                ArtifactNaming::SceneSequence,
                settings.sketch_payload(&entry.prompt, BATCH_NEGATIVE_PROMPT),
            )
        })
        .collect()
}

/// The image request of one script scene, saved as `scene_{n}`.
pub fn scene_image_request(scene: &Scene, settings: &ImageSettings) -> GenerationRequest {
    GenerationRequest::new(
        0,
        format!("scene {}", scene.scene_number),
        ArtifactNaming::Scene(scene.scene_number),
        settings.sketch_payload(&scene.visual_prompt, BATCH_NEGATIVE_PROMPT),
    )
}

/// An animated clip of `duration_secs` seconds at [`CLIP_FPS`].
///
/// The prompt is used verbatim, without sketch styling.
pub fn clip_request(
    prompt: &str,
    negative_prompt: Option<&str>,
    duration_secs: f64,
    settings: &ImageSettings,
) -> Result<GenerationRequest, CoreError> {
    let payload = clip_payload(
        prompt,
        negative_prompt.unwrap_or_default(),
        duration_secs,
        settings,
    )?;
    Ok(
        GenerationRequest::new(0, prompt, ArtifactNaming::SceneSequence, payload)
            .with_stem(stem_from_prompt("clip", prompt)),
    )
}

/// One clip request per script line, saved as `clip_001`, `clip_002`, ...
/// and named by the line's description.
pub fn batch_clip_requests(
    clips: &[ClipLine],
    settings: &ImageSettings,
) -> Result<Vec<GenerationRequest>, CoreError> {
    clips
        .iter()
        .enumerate()
        .map(|(index, clip)| {
            let payload =
                clip_payload(&clip.prompt(), CLIP_NEGATIVE_PROMPT, clip.duration, settings)?;
            Ok(GenerationRequest::new(
                index,
                clip.description.clone(),
                ArtifactNaming::ClipSequence,
                payload,
            ))
        })
        .collect()
}

fn clip_payload(
    prompt: &str,
    negative_prompt: &str,
    duration_secs: f64,
    settings: &ImageSettings,
) -> Result<Payload, CoreError> {
    let frames = (duration_secs * f64::from(CLIP_FPS)) as u32;
    if !duration_secs.is_finite() || frames == 0 {
        return Err(CoreError::Validation(format!(
            "Clip duration must yield at least one frame, got {duration_secs}s"
        )));
    }

    Ok(Payload::Image {
        prompt: prompt.to_string(),
        negative_prompt: negative_prompt.to_string(),
        params: settings.params(frames),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn entry(name: &str, prompt: &str) -> PromptEntry {
        PromptEntry {
            name: name.into(),
            prompt: prompt.into(),
        }
    }

    fn image_payload(req: &GenerationRequest) -> (&str, &str, &ImageParams) {
        match &req.payload {
            Payload::Image {
                prompt,
                negative_prompt,
                params,
            } => (prompt, negative_prompt, params),
            other => panic!("expected image payload, got {other:?}"),
        }
    }

    #[test]
    fn batch_requests_follow_file_order() {
        let entries = vec![entry("intro", "a hiker"), entry("outro", "a sunset")];
        let reqs = batch_requests(&entries, &ImageSettings::batch());

        let stems: Vec<&str> = reqs.iter().map(|r| r.stem.as_str()).collect();
        assert_eq!(stems, ["scene-1", "scene-2"]);
        assert_eq!(reqs[1].name, "outro");

        let (prompt, negative, params) = image_payload(&reqs[0]);
        assert!(prompt.starts_with("a hiker, "));
        assert_eq!(negative, BATCH_NEGATIVE_PROMPT);
        assert_eq!(params.batch_size, 1);
        assert_eq!(params.resolution.to_string(), "1024x768");
    }

    #[test]
    fn fixed_seed_is_shared_by_all_requests() {
        let settings = ImageSettings {
            seed: Seed::Fixed(42),
            ..ImageSettings::batch()
        };
        let reqs = batch_requests(&[entry("a", "x"), entry("b", "y")], &settings);
        assert!(reqs.iter().all(|r| image_payload(r).2.seed == 42));
    }

    #[test]
    fn sketch_stem_from_prompt_or_filename() {
        let settings = ImageSettings::single();
        assert_eq!(
            sketch_request("a cat, sitting", None, None, &settings).stem,
            "sketch_a_cat_sitting"
        );
        assert_eq!(sketch_request("a cat", None, Some("hero.png"), &settings).stem, "hero");

        let req = sketch_request("a cat", Some("blurry"), None, &settings);
        assert_eq!(image_payload(&req).1, "blurry");
        let req = sketch_request("a cat", None, None, &settings);
        assert_eq!(image_payload(&req).1, SKETCH_NEGATIVE_PROMPT);
    }

    #[test]
    fn scene_request_is_named_by_scene_number() {
        let scene = Scene {
            scene_number: 7,
            visual_prompt: "a lighthouse".into(),
            voice_over: String::new(),
        };
        let req = scene_image_request(&scene, &ImageSettings::batch());
        assert_eq!(req.stem, "scene_7");
        assert_eq!(req.name, "scene 7");
    }

    #[test]
    fn clip_duration_becomes_frame_count() {
        let req = clip_request("waves", None, 2.0, &ImageSettings::single()).unwrap();
        let (prompt, negative, params) = image_payload(&req);
        assert_eq!(prompt, "waves");
        assert_eq!(negative, "");
        assert_eq!(params.batch_size, 48);
        assert_eq!(req.stem, "clip_waves");
    }

    #[test]
    fn clip_without_frames_is_rejected() {
        assert_matches!(
            clip_request("waves", None, 0.0, &ImageSettings::single()),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            clip_request("waves", None, f64::NAN, &ImageSettings::single()),
            Err(CoreError::Validation(_))
        );
    }

    fn clip_line(line: usize, description: &str, duration: f64) -> ClipLine {
        ClipLine {
            line,
            description: description.into(),
            duration,
        }
    }

    #[test]
    fn scripted_clips_use_per_line_frame_counts() {
        let clips = vec![clip_line(1, "a kettle", 2.0), clip_line(3, "steam rising", 0.5)];
        let reqs = batch_clip_requests(&clips, &ImageSettings::single()).unwrap();

        let stems: Vec<&str> = reqs.iter().map(|r| r.stem.as_str()).collect();
        assert_eq!(stems, ["clip_001", "clip_002"]);
        assert_eq!(reqs[1].name, "steam rising");
        assert_eq!(reqs[1].index, 1);

        let (prompt, negative, params) = image_payload(&reqs[0]);
        assert!(prompt.starts_with("simple line drawing of a kettle, "));
        assert_eq!(negative, CLIP_NEGATIVE_PROMPT);
        assert_eq!(params.batch_size, 48);
        assert_eq!(image_payload(&reqs[1]).2.batch_size, 12);
    }

    #[test]
    fn scripted_clip_too_short_for_a_frame_fails_the_batch() {
        let clips = vec![clip_line(1, "ok", 2.0), clip_line(2, "blink", 0.01)];
        assert_matches!(
            batch_clip_requests(&clips, &ImageSettings::single()),
            Err(CoreError::Validation(_))
        );
    }
}
