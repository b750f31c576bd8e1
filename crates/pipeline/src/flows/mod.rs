//! End-to-end jobs built on the dispatcher: image batches, voiceovers,
//! scripted scenes, video assembly and the installation check.

pub mod assemble;
pub mod check;
pub mod images;
pub mod scenes;
pub mod voiceover;

use sketchcast_comfyui::workflow::WorkflowError;
use sketchcast_core::error::CoreError;
use sketchcast_core::ffmpeg::FfmpegError;

use crate::dispatcher::DispatchError;

/// Errors that stop a whole flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// At least one voice chunk failed, so nothing was merged.
    #[error("{failed} of {total} voice chunks failed: {first_error}")]
    ChunksFailed {
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// An assembly source yielded nothing to put in the video.
    #[error("No media found in {0}")]
    NoMedia(String),
}
