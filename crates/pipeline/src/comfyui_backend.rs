//! Image and clip generation through a ComfyUI instance.

use std::path::PathBuf;
use std::sync::Arc;

use sketchcast_comfyui::api::{ComfyUIApi, SubmitOutcome};
use sketchcast_comfyui::history::{HistoryEntry, OutputKind};
use sketchcast_comfyui::workflow::{WorkflowParams, WorkflowTemplate};
use sketchcast_core::types::{GenerationRequest, JobHandle, Payload};

use crate::backend::{BackendError, GenerationBackend, PollStatus, Submission};

pub struct ComfyUiBackend {
    api: ComfyUIApi,
    template: Arc<WorkflowTemplate>,
    checkpoint: String,
    output_dir: PathBuf,
    kind: OutputKind,
}

impl ComfyUiBackend {
    pub fn new(
        api: ComfyUIApi,
        template: Arc<WorkflowTemplate>,
        checkpoint: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            template,
            checkpoint: checkpoint.into(),
            output_dir: output_dir.into(),
            kind: OutputKind::Image,
        }
    }

    /// Collect `videos`/`gifs` descriptors instead of `images`.
    pub fn with_output_kind(mut self, kind: OutputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    fn workflow_params(&self, request: &GenerationRequest) -> Result<WorkflowParams, BackendError> {
        let Payload::Image {
            prompt,
            negative_prompt,
            params,
        } = &request.payload
        else {
            return Err(BackendError::UnsupportedPayload {
                backend: self.name(),
                payload: "speech",
            });
        };

        Ok(WorkflowParams {
            checkpoint: self.checkpoint.clone(),
            prompt: prompt.clone(),
            negative_prompt: negative_prompt.clone(),
            width: params.resolution.width,
            height: params.resolution.height,
            batch_size: params.batch_size,
            seed: params.seed,
            steps: params.steps,
            cfg: params.cfg_scale,
            filename_prefix: request.stem.clone(),
        })
    }
}

impl GenerationBackend for ComfyUiBackend {
    type Artifact = HistoryEntry;

    fn name(&self) -> &'static str {
        "ComfyUI"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.api.system_stats().await?;
        tracing::debug!(api_url = self.api.api_url(), "ComfyUI is reachable");
        Ok(())
    }

    async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<Submission<HistoryEntry>, BackendError> {
        let workflow = self.template.render(&self.workflow_params(request)?)?;
        let client_id = uuid::Uuid::new_v4().to_string();

        match self.api.submit_workflow(&workflow, &client_id).await? {
            SubmitOutcome::Queued(handle) => Ok(Submission::Queued(handle)),
            SubmitOutcome::Rejected(rejection) => Ok(Submission::Rejected(rejection.describe())),
        }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollStatus<HistoryEntry>, BackendError> {
        match self.api.get_history(handle).await? {
            Some(entry) if entry.is_complete() => Ok(PollStatus::Complete(entry)),
            _ => Ok(PollStatus::Pending),
        }
    }

    async fn fetch(
        &self,
        request: &GenerationRequest,
        entry: HistoryEntry,
    ) -> Result<PathBuf, BackendError> {
        let file = entry
            .first_output(self.kind)
            .ok_or(BackendError::NoOutput(self.kind.missing_message()))?;

        let extension = file.extension_or(self.kind.default_extension());
        let dest = self.output_dir.join(format!("{}{extension}", request.stem));
        tokio::fs::create_dir_all(&self.output_dir).await?;
        self.api.download(file, &dest).await?;
        Ok(dest)
    }
}
