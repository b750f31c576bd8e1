//! Domain logic for the sketchcast pipeline.
//!
//! Pure building blocks shared by the backend clients, the dispatcher and
//! the CLI: the request/result model, narration chunking, artifact
//! naming, prompt, script and clip-script parsing, configuration, and thin wrappers
//! over the `ffmpeg` executable.

pub mod chunking;
pub mod clip_script;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod manifest;
pub mod naming;
pub mod params;
pub mod prompts;
pub mod resolution;
pub mod script;
pub mod types;
