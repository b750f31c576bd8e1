//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sketchcast_core::params::{Seed, Voice};
use sketchcast_core::prompts::SketchStyle;
use sketchcast_core::resolution::Resolution;

/// Whiteboard-style video pipeline: sketches via ComfyUI, narration via
/// an OpenAI-compatible speech server, assembly via ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "sketchcast", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one sketch image.
    Sketch(SketchArgs),
    /// Generate one image per entry of a prompts file.
    Batch(BatchArgs),
    /// Generate a short animated clip.
    Clip(ClipArgs),
    /// Generate one clip per line of a clip script.
    Clips(ClipsArgs),
    /// Turn a narration text file into one MP3.
    Voiceover(VoiceoverArgs),
    /// Generate image and narration for every scene of a JSON script.
    Scenes(ScenesArgs),
    /// Concatenate clips or manifest images into a video.
    Assemble(AssembleArgs),
    /// Check tools, services and workflow files.
    Check,
}

/// Sampling flags shared by the image commands.
#[derive(Args, Debug, Clone)]
pub struct SamplingArgs {
    /// Random seed; -1 draws a fresh one per image.
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub seed: Seed,

    /// sketch, character, object or scene.
    #[arg(long, default_value = "sketch")]
    pub style: SketchStyle,
}

#[derive(Args, Debug)]
pub struct SketchArgs {
    /// Subject of the sketch; style keywords are appended.
    #[arg(long)]
    pub prompt: String,

    /// Replaces the default negative prompt.
    #[arg(long)]
    pub negative: Option<String>,

    #[arg(long, default_value = "768x768")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 25)]
    pub steps: u32,

    #[arg(long, default_value_t = 7.5)]
    pub cfg: f32,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    #[arg(long, default_value = "output/sketches")]
    pub output: PathBuf,

    /// Output file name without extension.
    #[arg(long)]
    pub filename: Option<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Prompts file (`name:` headers followed by prompt lines).
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long, default_value = "output/images")]
    pub output: PathBuf,

    #[arg(long, default_value = "1024x768")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 20)]
    pub steps: u32,

    #[arg(long, default_value_t = 7.0)]
    pub cfg: f32,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Number of concurrent requests; 1 runs sequentially with --delay.
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Seconds to wait between sequential requests.
    #[arg(long, default_value_t = 5)]
    pub delay: u64,
}

#[derive(Args, Debug)]
pub struct ClipArgs {
    #[arg(long)]
    pub prompt: String,

    #[arg(long)]
    pub negative: Option<String>,

    /// Clip length in seconds (24 frames per second).
    #[arg(long, default_value_t = 2.0)]
    pub duration: f64,

    #[arg(long, default_value = "768x768")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 25)]
    pub steps: u32,

    #[arg(long, default_value_t = 7.5)]
    pub cfg: f32,

    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub seed: Seed,

    #[arg(long, default_value = "output/clips")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ClipsArgs {
    /// Clip script: one `Description (2s)` or `Description - 2s` per line.
    #[arg(long)]
    pub script: PathBuf,

    #[arg(long, default_value = "output/clips")]
    pub output: PathBuf,

    #[arg(long, default_value = "768x768")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 25)]
    pub steps: u32,

    #[arg(long, default_value_t = 7.5)]
    pub cfg: f32,

    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub seed: Seed,

    /// Number of concurrent requests; 1 runs sequentially with --delay.
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Seconds to wait between sequential requests.
    #[arg(long, default_value_t = 0)]
    pub delay: u64,
}

/// Speech endpoint selection shared by the narration commands.
#[derive(Args, Debug, Clone)]
pub struct SpeechArgs {
    /// API key for the hosted endpoint (defaults to OPENAI_API_KEY).
    #[arg(long)]
    pub api_key: Option<String>,

    /// Use a self-hosted compatible server instead of the hosted API.
    #[arg(long)]
    pub open_source: bool,

    /// Base URL of the self-hosted server (defaults to OPENAI_BASE_URL).
    #[arg(long, requires = "open_source")]
    pub base_url: Option<String>,

    /// Defaults to TTS_VOICE.
    #[arg(long)]
    pub voice: Option<Voice>,

    /// Delivery instructions (defaults to TTS_INSTRUCTIONS).
    #[arg(long)]
    pub instructions: Option<String>,
}

#[derive(Args, Debug)]
pub struct VoiceoverArgs {
    /// Narration text file.
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long, default_value = "output/voiceover.mp3")]
    pub output: PathBuf,

    #[command(flatten)]
    pub speech: SpeechArgs,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters repeated between consecutive chunks.
    #[arg(long, default_value_t = 50)]
    pub overlap: usize,
}

#[derive(Args, Debug)]
pub struct ScenesArgs {
    /// JSON script: `[{scene_number, visual_prompt, voice_over}]`.
    #[arg(long)]
    pub script: PathBuf,

    #[arg(long, default_value = "output/scenes")]
    pub output: PathBuf,

    #[arg(long, default_value = "1024x768")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 20)]
    pub steps: u32,

    #[arg(long, default_value_t = 7.0)]
    pub cfg: f32,

    #[command(flatten)]
    pub speech: SpeechArgs,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("source").required(true).args(["clips", "manifest"]))]
pub struct AssembleArgs {
    /// Directory of `*.mp4` / `*.mov` clips.
    #[arg(long)]
    pub clips: Option<PathBuf>,

    /// `manifest.json` written by the batch command.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Audio track to mux under the video.
    #[arg(long)]
    pub voiceover: Option<PathBuf>,

    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 24)]
    pub fps: u32,

    /// Seconds each still image is shown.
    #[arg(long, default_value_t = 5.0)]
    pub image_duration: f64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn batch_defaults() {
        let cli = Cli::parse_from(["sketchcast", "batch", "--file", "prompts.txt"]);
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.resolution.to_string(), "1024x768");
        assert_eq!((args.steps, args.parallel, args.delay), (20, 1, 5));
        assert_eq!(args.sampling.seed, Seed::Random);
    }

    #[test]
    fn negative_seed_and_style_parse() {
        let cli = Cli::parse_from([
            "sketchcast", "sketch", "--prompt", "a cat", "--seed", "-1", "--style", "character",
        ]);
        let Command::Sketch(args) = cli.command else {
            panic!("expected sketch");
        };
        assert_eq!(args.sampling.seed, Seed::Random);
        assert_eq!(args.sampling.style, SketchStyle::Character);
    }

    #[test]
    fn clips_defaults() {
        let cli = Cli::parse_from(["sketchcast", "clips", "--script", "script.txt"]);
        let Command::Clips(args) = cli.command else {
            panic!("expected clips");
        };
        assert_eq!(args.output, PathBuf::from("output/clips"));
        assert_eq!(args.resolution.to_string(), "768x768");
        assert_eq!((args.steps, args.parallel, args.delay), (25, 1, 0));
    }

    #[test]
    fn assemble_requires_a_source() {
        assert!(Cli::try_parse_from(["sketchcast", "assemble", "--output", "out.mp4"]).is_err());
        assert!(Cli::try_parse_from([
            "sketchcast", "assemble", "--clips", "c", "--manifest", "m", "--output", "o.mp4",
        ])
        .is_err());
    }

    #[test]
    fn base_url_needs_open_source() {
        assert!(Cli::try_parse_from([
            "sketchcast", "voiceover", "--file", "n.txt", "--base-url", "http://x/v1",
        ])
        .is_err());
    }
}
