//! In-memory backend for exercising the dispatcher and flows.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sketchcast_core::naming::ArtifactNaming;
use sketchcast_core::params::Voice;
use sketchcast_core::types::{GenerationRequest, JobHandle, Payload};
use sketchcast_pipeline::backend::{BackendError, GenerationBackend, PollStatus, Submission};

/// How the fake treats one request index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Queue, report complete on the given poll, then fetch.
    Succeed { polls: u32 },
    /// Complete during submission (speech-style).
    Immediate,
    /// Answer the submission with an error payload.
    Reject(&'static str),
    /// Fail the submission call itself.
    SubmitError,
    /// Stay pending forever.
    NeverFinish,
    /// Complete, but with nothing to download.
    NoOutput,
}

pub struct FakeBackend {
    default: Behavior,
    overrides: HashMap<usize, Behavior>,
    healthy: bool,
    /// When set, fetch writes a small file here.
    output_dir: Option<PathBuf>,

    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    remaining: Mutex<HashMap<String, (usize, u32)>>,
}

impl FakeBackend {
    pub fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            healthy: true,
            output_dir: None,
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            remaining: Mutex::new(HashMap::new()),
        }
    }

    pub fn with(mut self, index: usize, behavior: Behavior) -> Self {
        self.overrides.insert(index, behavior);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn writing_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    fn behavior(&self, index: usize) -> Behavior {
        self.overrides.get(&index).copied().unwrap_or(self.default)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GenerationBackend for FakeBackend {
    type Artifact = usize;

    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        if self.healthy {
            Ok(())
        } else {
            Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission<usize>, BackendError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let handle = JobHandle(format!("job-{}", request.index));

        match self.behavior(request.index) {
            Behavior::Succeed { polls } => {
                self.enter();
                self.remaining
                    .lock()
                    .unwrap()
                    .insert(handle.0.clone(), (request.index, polls));
                Ok(Submission::Queued(handle))
            }
            Behavior::NeverFinish | Behavior::NoOutput => {
                self.remaining
                    .lock()
                    .unwrap()
                    .insert(handle.0.clone(), (request.index, 1));
                Ok(Submission::Queued(handle))
            }
            Behavior::Immediate => {
                self.enter();
                Ok(Submission::Completed(request.index))
            }
            Behavior::Reject(message) => Ok(Submission::Rejected(message.to_string())),
            Behavior::SubmitError => Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "submit blew up",
            ))),
        }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollStatus<usize>, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.remaining.lock().unwrap();
        let Some((index, left)) = remaining.get_mut(&handle.0) else {
            return Ok(PollStatus::Pending);
        };
        if self.behavior(*index) == Behavior::NeverFinish {
            return Ok(PollStatus::Pending);
        }
        *left = left.saturating_sub(1);
        if *left == 0 {
            Ok(PollStatus::Complete(*index))
        } else {
            Ok(PollStatus::Pending)
        }
    }

    async fn fetch(
        &self,
        request: &GenerationRequest,
        index: usize,
    ) -> Result<PathBuf, BackendError> {
        if self.behavior(index) == Behavior::NoOutput {
            return Err(BackendError::NoOutput("No image output found"));
        }
        self.leave();

        let file_name = format!("{}.out", request.stem);
        match &self.output_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(file_name);
                tokio::fs::write(&path, request.name.as_bytes()).await?;
                Ok(path)
            }
            None => Ok(PathBuf::from(file_name)),
        }
    }
}

/// `count` speech requests named `item-0`, `item-1`, ...
pub fn requests(count: usize) -> Vec<GenerationRequest> {
    (0..count)
        .map(|index| {
            GenerationRequest::new(
                index,
                format!("item-{index}"),
                ArtifactNaming::SceneSequence,
                Payload::Speech {
                    text: format!("line {index}"),
                    voice: Voice::Onyx,
                    instructions: String::new(),
                },
            )
        })
        .collect()
}
