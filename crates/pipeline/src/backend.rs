//! The seam between the dispatcher and a concrete generation service.

use std::future::Future;
use std::path::PathBuf;

use sketchcast_comfyui::api::ComfyUIApiError;
use sketchcast_comfyui::workflow::WorkflowError;
use sketchcast_core::ffmpeg::FfmpegError;
use sketchcast_core::types::{GenerationRequest, JobHandle};
use sketchcast_speech::api::SpeechApiError;

/// Outcome of submitting one request.
#[derive(Debug)]
pub enum Submission<A> {
    /// Queued remotely; poll with the handle until complete.
    Queued(JobHandle),
    /// Finished during submission; no polling needed.
    Completed(A),
    /// The service answered with an explicit error payload.
    Rejected(String),
}

/// Result of one poll of a queued job.
#[derive(Debug)]
pub enum PollStatus<A> {
    Pending,
    Complete(A),
}

/// Errors raised by a backend while handling a single request.
///
/// These never abort a batch: the dispatcher turns them into failed
/// results carrying the error text.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    ComfyUI(#[from] ComfyUIApiError),

    #[error(transparent)]
    Speech(#[from] SpeechApiError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job finished but produced nothing this backend can save.
    #[error("{0}")]
    NoOutput(&'static str),

    /// The request payload is not something this backend generates.
    #[error("{backend} cannot handle {payload} requests")]
    UnsupportedPayload {
        backend: &'static str,
        payload: &'static str,
    },

    /// The backend completes jobs during submission and has nothing to poll.
    #[error("{0} jobs cannot be polled")]
    NotPollable(&'static str),
}

/// A remote generation service driven through submit / poll / fetch.
pub trait GenerationBackend: Send + Sync + 'static {
    /// Whatever a finished job hands to [`GenerationBackend::fetch`].
    type Artifact: Send + 'static;

    /// Human-readable service name for logs and pre-condition errors.
    fn name(&self) -> &'static str;

    /// Liveness probe run once before a dispatch.
    fn health_check(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn submit(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Submission<Self::Artifact>, BackendError>> + Send;

    fn poll(
        &self,
        handle: &JobHandle,
    ) -> impl Future<Output = Result<PollStatus<Self::Artifact>, BackendError>> + Send;

    /// Persist the finished artifact under the request's stem and return
    /// its path.
    fn fetch(
        &self,
        request: &GenerationRequest,
        artifact: Self::Artifact,
    ) -> impl Future<Output = Result<PathBuf, BackendError>> + Send;
}
