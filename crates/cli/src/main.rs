mod args;
mod commands;
mod progress;

use std::process::ExitCode;

use clap::Parser;
use sketchcast_core::config::PipelineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchcast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::from_env()?;
    tracing::debug!(
        comfyui_url = %config.comfyui_url,
        speech_base_url = %config.speech_base_url,
        "Configuration loaded",
    );

    match command {
        Command::Sketch(args) => commands::sketch(&config, args).await,
        Command::Batch(args) => commands::batch(&config, args).await,
        Command::Clip(args) => commands::clip(&config, args).await,
        Command::Clips(args) => commands::clips(&config, args).await,
        Command::Voiceover(args) => commands::voiceover(&config, args).await,
        Command::Scenes(args) => commands::scenes(&config, args).await,
        Command::Assemble(args) => commands::assemble(&config, args).await,
        Command::Check => commands::check(&config).await,
    }
}
