//! One handler per subcommand.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use sketchcast_comfyui::api::ComfyUIApi;
use sketchcast_comfyui::history::OutputKind;
use sketchcast_comfyui::workflow::WorkflowTemplate;
use sketchcast_core::clip_script::load_clip_script;
use sketchcast_core::config::PipelineConfig;
use sketchcast_core::ffmpeg::Ffmpeg;
use sketchcast_core::manifest::{Manifest, MANIFEST_FILE_NAME};
use sketchcast_core::prompts::load_prompts_file;
use sketchcast_core::script::load_script;
use sketchcast_core::types::{GenerationRequest, GenerationResult};
use sketchcast_pipeline::backend::GenerationBackend;
use sketchcast_pipeline::comfyui_backend::ComfyUiBackend;
use sketchcast_pipeline::dispatcher::{Dispatcher, ExecutionMode, PollPolicy};
use sketchcast_pipeline::flows::assemble::{
    assemble as assemble_video, AssemblySettings, AssemblySource,
};
use sketchcast_pipeline::flows::check::run_checks;
use sketchcast_pipeline::flows::images::{
    batch_clip_requests, batch_requests, clip_request, sketch_request, ImageSettings,
};
use sketchcast_pipeline::flows::scenes::run_scenes;
use sketchcast_pipeline::flows::voiceover::{generate_voiceover, scratch_dir_for, VoiceSettings};
use sketchcast_pipeline::speech_backend::SpeechBackend;
use sketchcast_pipeline::summary::BatchSummary;
use sketchcast_speech::api::SpeechApi;

use crate::args::{
    AssembleArgs, BatchArgs, ClipArgs, ClipsArgs, ScenesArgs, SketchArgs, SpeechArgs,
    VoiceoverArgs,
};
use crate::progress::spawn_printer;

const SINGLE: ExecutionMode = ExecutionMode::Sequential {
    delay: Duration::ZERO,
};

pub async fn sketch(config: &PipelineConfig, args: SketchArgs) -> anyhow::Result<ExitCode> {
    let settings = ImageSettings {
        resolution: args.resolution,
        steps: args.steps,
        cfg_scale: args.cfg,
        seed: args.sampling.seed,
        style: args.sampling.style,
    };
    let request = sketch_request(
        &args.prompt,
        args.negative.as_deref(),
        args.filename.as_deref(),
        &settings,
    );

    let backend = image_backend(
        config,
        &config.workflow_path,
        &args.output,
        OutputKind::Image,
    )
    .await?;
    let dispatcher = Dispatcher::new(Arc::new(backend), PollPolicy::SINGLE_SKETCH);
    let results = run_with_progress(dispatcher, vec![request], SINGLE).await?;
    Ok(exit_code(&results))
}

pub async fn batch(config: &PipelineConfig, args: BatchArgs) -> anyhow::Result<ExitCode> {
    let entries = load_prompts_file(&args.file)
        .await
        .with_context(|| format!("reading prompts file {}", args.file.display()))?;
    if entries.is_empty() {
        anyhow::bail!("No prompts found in {}", args.file.display());
    }

    let settings = ImageSettings {
        resolution: args.resolution,
        steps: args.steps,
        cfg_scale: args.cfg,
        seed: args.sampling.seed,
        style: args.sampling.style,
    };
    let requests = batch_requests(&entries, &settings);

    let backend = image_backend(
        config,
        &config.workflow_path,
        &args.output,
        OutputKind::Image,
    )
    .await?;
    let dispatcher = Dispatcher::new(Arc::new(backend), PollPolicy::BATCH_IMAGE);
    let mode = batch_mode(args.parallel, args.delay);
    run_batch(dispatcher, requests, mode, &args.output).await
}

pub async fn clip(config: &PipelineConfig, args: ClipArgs) -> anyhow::Result<ExitCode> {
    let settings = ImageSettings {
        resolution: args.resolution,
        steps: args.steps,
        cfg_scale: args.cfg,
        seed: args.seed,
        ..ImageSettings::single()
    };
    let request = clip_request(&args.prompt, args.negative.as_deref(), args.duration, &settings)?;

    let backend = image_backend(
        config,
        &config.clip_workflow_path,
        &args.output,
        OutputKind::Video,
    )
    .await?;
    let dispatcher = Dispatcher::new(Arc::new(backend), PollPolicy::CLIP);
    let results = run_with_progress(dispatcher, vec![request], SINGLE).await?;
    Ok(exit_code(&results))
}

pub async fn clips(config: &PipelineConfig, args: ClipsArgs) -> anyhow::Result<ExitCode> {
    let lines = load_clip_script(&args.script)
        .await
        .with_context(|| format!("reading clip script {}", args.script.display()))?;
    if lines.is_empty() {
        anyhow::bail!("No clips found in {}", args.script.display());
    }

    let settings = ImageSettings {
        resolution: args.resolution,
        steps: args.steps,
        cfg_scale: args.cfg,
        seed: args.seed,
        ..ImageSettings::single()
    };
    let requests = batch_clip_requests(&lines, &settings)?;

    let backend = image_backend(
        config,
        &config.clip_workflow_path,
        &args.output,
        OutputKind::Video,
    )
    .await?;
    let dispatcher = Dispatcher::new(Arc::new(backend), PollPolicy::CLIP);
    let mode = batch_mode(args.parallel, args.delay);
    run_batch(dispatcher, requests, mode, &args.output).await
}

pub async fn voiceover(config: &PipelineConfig, args: VoiceoverArgs) -> anyhow::Result<ExitCode> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading narration {}", args.file.display()))?;

    let ffmpeg = Ffmpeg::new(&config.ffmpeg_bin);
    ffmpeg
        .check_available()
        .await
        .context("ffmpeg is required to encode narration")?;

    let api = speech_api(config, &args.speech)?;
    let settings = VoiceSettings {
        max_chars: args.chunk_size,
        overlap: args.overlap,
        ..voice_settings(config, &args.speech)
    };

    let backend = SpeechBackend::new(api, ffmpeg.clone(), scratch_dir_for(&args.output));
    let dispatcher = Dispatcher::new(Arc::new(backend), PollPolicy::BATCH_IMAGE);
    let printer = spawn_printer(dispatcher.subscribe());

    let started = Instant::now();
    let outcome = generate_voiceover(&dispatcher, &ffmpeg, &text, &args.output, &settings).await;
    drop(dispatcher);
    let _ = printer.await;

    let outcome = outcome?;
    println!(
        "\nVoiceover saved to {} ({} chunk(s), {:.1}s)",
        outcome.output.display(),
        outcome.chunks,
        started.elapsed().as_secs_f64()
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn scenes(config: &PipelineConfig, args: ScenesArgs) -> anyhow::Result<ExitCode> {
    let scenes = load_script(&args.script).await?;
    let ffmpeg = Ffmpeg::new(&config.ffmpeg_bin);
    ffmpeg
        .check_available()
        .await
        .context("ffmpeg is required to encode narration")?;

    let image_settings = ImageSettings {
        resolution: args.resolution,
        steps: args.steps,
        cfg_scale: args.cfg,
        ..ImageSettings::batch()
    };
    let voice_settings = voice_settings(config, &args.speech);

    let stills = image_backend(
        config,
        &config.workflow_path,
        &args.output,
        OutputKind::Image,
    )
    .await?;
    let images = Dispatcher::new(Arc::new(stills), PollPolicy::BATCH_IMAGE);
    let voices = Dispatcher::new(
        Arc::new(SpeechBackend::new(
            speech_api(config, &args.speech)?,
            ffmpeg,
            &args.output,
        )),
        PollPolicy::BATCH_IMAGE,
    );
    let image_printer = spawn_printer(images.subscribe());
    let voice_printer = spawn_printer(voices.subscribe());

    let started = Instant::now();
    let outcomes = run_scenes(&images, &voices, &scenes, &image_settings, &voice_settings).await;
    drop((images, voices));
    let _ = tokio::join!(image_printer, voice_printer);
    let outcomes = outcomes?;

    println!();
    for outcome in &outcomes {
        let mark = if outcome.success() { "✓" } else { "✗" };
        println!(
            "{mark} Scene {}: image {}, {} voice chunk(s)",
            outcome.scene_number,
            if outcome.image.success { "ok" } else { "failed" },
            outcome.voice.len()
        );
    }
    let failed = outcomes.iter().filter(|o| !o.success()).count();
    println!(
        "\n{}/{} scenes complete in {:.1}s",
        outcomes.len() - failed,
        outcomes.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn assemble(config: &PipelineConfig, args: AssembleArgs) -> anyhow::Result<ExitCode> {
    let source = match (args.clips, args.manifest) {
        (Some(dir), _) => AssemblySource::Clips(dir),
        (None, Some(manifest)) => AssemblySource::Manifest(manifest),
        (None, None) => anyhow::bail!("Provide --clips or --manifest"),
    };
    let settings = AssemblySettings {
        fps: args.fps,
        image_duration: args.image_duration,
    };

    let count = assemble_video(
        &Ffmpeg::new(&config.ffmpeg_bin),
        &source,
        args.voiceover.as_deref(),
        &args.output,
        &settings,
    )
    .await?;

    println!("Video saved to {} ({count} input(s))", args.output.display());
    Ok(ExitCode::SUCCESS)
}

pub async fn check(config: &PipelineConfig) -> anyhow::Result<ExitCode> {
    let report = run_checks(config).await;
    for item in &report.items {
        println!("{item}");
    }
    println!("\nOverall: {}/{} checks passed", report.passed(), report.items.len());

    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

// ---- private helpers ----

async fn image_backend(
    config: &PipelineConfig,
    template_path: &Path,
    output: &Path,
    kind: OutputKind,
) -> anyhow::Result<ComfyUiBackend> {
    let template = WorkflowTemplate::load(template_path)
        .await
        .with_context(|| format!("loading workflow {}", template_path.display()))?;
    Ok(ComfyUiBackend::new(
        ComfyUIApi::new(&config.comfyui_url),
        Arc::new(template),
        &config.checkpoint_name,
        output,
    )
    .with_output_kind(kind))
}

fn speech_api(config: &PipelineConfig, args: &SpeechArgs) -> anyhow::Result<SpeechApi> {
    if args.open_source {
        let base = args
            .base_url
            .clone()
            .unwrap_or_else(|| config.speech_base_url.clone());
        return Ok(SpeechApi::open_source(base));
    }
    let key = args.api_key.clone().or_else(|| config.speech_api_key.clone());
    Ok(SpeechApi::official(key)?)
}

fn voice_settings(config: &PipelineConfig, args: &SpeechArgs) -> VoiceSettings {
    VoiceSettings {
        voice: args.voice.unwrap_or(config.tts_voice),
        instructions: args
            .instructions
            .clone()
            .unwrap_or_else(|| config.tts_instructions.clone()),
        ..VoiceSettings::default()
    }
}

/// `--parallel 1` runs one at a time with `delay_secs` between requests.
fn batch_mode(parallel: usize, delay_secs: u64) -> ExecutionMode {
    match parallel {
        1 => ExecutionMode::Sequential {
            delay: Duration::from_secs(delay_secs),
        },
        width => ExecutionMode::Parallel { width },
    }
}

/// Run a multi-request batch, print its summary and write the manifest of
/// successful outputs into `output`.
async fn run_batch<B: GenerationBackend>(
    dispatcher: Dispatcher<B>,
    requests: Vec<GenerationRequest>,
    mode: ExecutionMode,
    output: &Path,
) -> anyhow::Result<ExitCode> {
    let started = Instant::now();
    let results = run_with_progress(dispatcher, requests, mode).await?;
    let summary = BatchSummary::from_results(&results, started.elapsed());
    println!("\n{summary}");

    let manifest = Manifest::from_results(&results);
    if !manifest.is_empty() {
        let path = output.join(MANIFEST_FILE_NAME);
        manifest.write(&path).await?;
        println!("Manifest: {}", path.display());
    }

    Ok(exit_code(&results))
}

/// Run one batch while printing progress; the dispatcher is consumed so
/// the printer sees the channel close.
async fn run_with_progress<B: GenerationBackend>(
    dispatcher: Dispatcher<B>,
    requests: Vec<GenerationRequest>,
    mode: ExecutionMode,
) -> anyhow::Result<Vec<GenerationResult>> {
    let printer = spawn_printer(dispatcher.subscribe());
    let results = dispatcher.run(requests, mode).await;
    drop(dispatcher);
    let _ = printer.await;
    Ok(results?)
}

fn exit_code(results: &[GenerationResult]) -> ExitCode {
    if results.iter().all(|r| r.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
