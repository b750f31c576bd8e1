//! Narration through an OpenAI-compatible speech endpoint.
//!
//! Synthesis streams synchronously, so submission already yields the raw
//! PCM file and nothing is polled. Fetch transcodes it to MP3.

use std::path::PathBuf;

use sketchcast_core::ffmpeg::Ffmpeg;
use sketchcast_core::types::{GenerationRequest, JobHandle, Payload};
use sketchcast_speech::api::SpeechApi;

use crate::backend::{BackendError, GenerationBackend, PollStatus, Submission};

pub struct SpeechBackend {
    api: SpeechApi,
    ffmpeg: Ffmpeg,
    output_dir: PathBuf,
}

impl SpeechBackend {
    pub fn new(api: SpeechApi, ffmpeg: Ffmpeg, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            ffmpeg,
            output_dir: output_dir.into(),
        }
    }

    pub fn api(&self) -> &SpeechApi {
        &self.api
    }
}

impl GenerationBackend for SpeechBackend {
    /// Path of the synthesized PCM file.
    type Artifact = PathBuf;

    fn name(&self) -> &'static str {
        "TTS server"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.api.health().await?;
        Ok(())
    }

    async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<Submission<PathBuf>, BackendError> {
        let Payload::Speech {
            text,
            voice,
            instructions,
        } = &request.payload
        else {
            return Err(BackendError::UnsupportedPayload {
                backend: self.name(),
                payload: "image",
            });
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let pcm = self.output_dir.join(format!("{}.pcm", request.stem));
        let bytes = self
            .api
            .synthesize_to_file(text, *voice, instructions, &pcm)
            .await?;

        tracing::info!(
            index = request.index,
            chars = text.chars().count(),
            bytes,
            "Speech synthesized",
        );
        Ok(Submission::Completed(pcm))
    }

    async fn poll(&self, _handle: &JobHandle) -> Result<PollStatus<PathBuf>, BackendError> {
        Err(BackendError::NotPollable(self.name()))
    }

    async fn fetch(
        &self,
        request: &GenerationRequest,
        pcm: PathBuf,
    ) -> Result<PathBuf, BackendError> {
        let mp3 = self.output_dir.join(format!("{}.mp3", request.stem));
        self.ffmpeg.transcode_pcm_to_mp3(&pcm, &mp3).await?;
        Ok(mp3)
    }
}
