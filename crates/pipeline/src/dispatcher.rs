//! Bounded-concurrency job dispatcher and poller.
//!
//! Each request runs through a small state machine:
//!
//! ```text
//! Submitted ──► Polling ──► Succeeded
//!     │            ├──────► Failed
//!     │            └──────► TimedOut
//!     └──► Failed (error payload, no polling)
//! ```
//!
//! Every request yields exactly one [`GenerationResult`]; a failing
//! request never aborts the batch. The only batch-level failure is the
//! liveness probe, which runs once before anything is submitted.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sketchcast_core::types::{GenerationRequest, GenerationResult, JobHandle};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;

use crate::backend::{GenerationBackend, PollStatus, Submission};
use crate::events::DispatchEvent;

/// Broadcast channel capacity for progress events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Failure text for a request whose poll budget ran out.
pub const TIMEOUT_MESSAGE: &str = "Timeout waiting for generation";

/// Failure text for a request whose worker task died.
pub const WORKER_LOST_MESSAGE: &str = "Worker terminated before producing a result";

/// How often to poll and for how long before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl PollPolicy {
    /// Batch and scene images: every 2 s for up to 3 minutes.
    pub const BATCH_IMAGE: Self = Self {
        interval: Duration::from_secs(2),
        budget: Duration::from_secs(180),
    };

    /// One-off sketch: every 3 s for up to 5 minutes.
    pub const SINGLE_SKETCH: Self = Self {
        interval: Duration::from_secs(3),
        budget: Duration::from_secs(300),
    };

    /// Animated clip: every 5 s for up to 10 minutes.
    pub const CLIP: Self = Self {
        interval: Duration::from_secs(5),
        budget: Duration::from_secs(600),
    };
}

/// How a batch is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One at a time in index order, pausing `delay` between requests
    /// (not after the last one).
    Sequential { delay: Duration },
    /// A fixed pool of `width` workers; at most `width` requests in flight.
    Parallel { width: usize },
}

/// Batch-level failures. Per-request problems are reported in results.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The liveness probe failed; nothing was submitted.
    #[error("{service} service not running: {reason}")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("Invalid execution mode: {0}")]
    InvalidMode(String),
}

/// Per-request lifecycle.
enum JobState<A> {
    Submitted(JobHandle),
    Ready(A),
    Succeeded(PathBuf),
    Failed(String),
    TimedOut,
}

/// Drives a batch of requests against one backend.
pub struct Dispatcher<B: GenerationBackend> {
    backend: Arc<B>,
    policy: PollPolicy,
    event_tx: broadcast::Sender<DispatchEvent>,
}

impl<B: GenerationBackend> Dispatcher<B> {
    pub fn new(backend: Arc<B>, policy: PollPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            policy,
            event_tx,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_tx.subscribe()
    }

    /// Probe the backend, then dispatch every request.
    ///
    /// Returns one result per request, sorted by request index.
    pub async fn run(
        &self,
        requests: Vec<GenerationRequest>,
        mode: ExecutionMode,
    ) -> Result<Vec<GenerationResult>, DispatchError> {
        validate_mode(mode)?;
        self.preflight().await?;
        self.dispatch(requests, mode).await
    }

    /// Run the liveness probe alone.
    pub async fn preflight(&self) -> Result<(), DispatchError> {
        self.backend.health_check().await.map_err(|e| {
            tracing::error!(service = self.backend.name(), error = %e, "Liveness probe failed");
            DispatchError::ServiceUnavailable {
                service: self.backend.name(),
                reason: e.to_string(),
            }
        })
    }

    /// Dispatch without probing; for callers that already ran
    /// [`Dispatcher::preflight`] for a multi-batch job.
    pub async fn dispatch(
        &self,
        requests: Vec<GenerationRequest>,
        mode: ExecutionMode,
    ) -> Result<Vec<GenerationResult>, DispatchError> {
        validate_mode(mode)?;

        let total = requests.len();
        self.emit(DispatchEvent::BatchStarted {
            total,
            service: self.backend.name(),
        });
        tracing::info!(service = self.backend.name(), total, ?mode, "Dispatching batch");

        let mut results = match mode {
            ExecutionMode::Sequential { delay } => self.run_sequential(requests, delay).await,
            ExecutionMode::Parallel { width } => self.run_parallel(requests, width).await,
        };
        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    // ---- private helpers ----

    async fn run_sequential(
        &self,
        requests: Vec<GenerationRequest>,
        delay: Duration,
    ) -> Vec<GenerationResult> {
        let total = requests.len();
        let mut results = Vec::with_capacity(total);

        for (position, request) in requests.iter().enumerate() {
            self.emit(DispatchEvent::Started {
                index: request.index,
                name: request.name.clone(),
                total,
            });

            let result = execute(self.backend.as_ref(), self.policy, request).await;
            self.emit(DispatchEvent::Finished {
                completed: position + 1,
                total,
                result: result.clone(),
            });
            results.push(result);

            if position + 1 < total && !delay.is_zero() {
                self.emit(DispatchEvent::Waiting { delay });
                tokio::time::sleep(delay).await;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        requests: Vec<GenerationRequest>,
        width: usize,
    ) -> Vec<GenerationResult> {
        let total = requests.len();
        let queue: Arc<Mutex<VecDeque<(usize, GenerationRequest)>>> =
            Arc::new(Mutex::new(requests.iter().cloned().enumerate().collect()));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, GenerationResult)>();

        let mut workers = Vec::with_capacity(width.min(total));
        for worker_id in 0..width.min(total) {
            let queue = Arc::clone(&queue);
            let result_tx = result_tx.clone();
            let backend = Arc::clone(&self.backend);
            let event_tx = self.event_tx.clone();
            let policy = self.policy;

            workers.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((slot, request)) = next else {
                        break;
                    };
                    let _ = event_tx.send(DispatchEvent::Started {
                        index: request.index,
                        name: request.name.clone(),
                        total,
                    });
                    tracing::debug!(worker_id, index = request.index, "Worker picked up request");

                    let result = execute(backend.as_ref(), policy, &request).await;
                    if result_tx.send((slot, result)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        // Results arrive in completion order; slots restore request order.
        let mut slots: Vec<Option<GenerationResult>> = vec![None; total];
        let mut completed = 0;
        while let Some((slot, result)) = result_rx.recv().await {
            completed += 1;
            self.emit(DispatchEvent::Finished {
                completed,
                total,
                result: result.clone(),
            });
            slots[slot] = Some(result);
        }

        for (worker_id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker_id, error = %e, "Dispatch worker terminated abnormally");
            }
        }

        slots
            .into_iter()
            .zip(&requests)
            .map(|(slot, request)| {
                slot.unwrap_or_else(|| {
                    tracing::error!(index = request.index, "No result recorded for request");
                    GenerationResult::failed(request, WORKER_LOST_MESSAGE)
                })
            })
            .collect()
    }

    fn emit(&self, event: DispatchEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

fn validate_mode(mode: ExecutionMode) -> Result<(), DispatchError> {
    match mode {
        ExecutionMode::Parallel { width: 0 } => Err(DispatchError::InvalidMode(
            "parallel width must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Drive one request to a terminal state.
async fn execute<B: GenerationBackend>(
    backend: &B,
    policy: PollPolicy,
    request: &GenerationRequest,
) -> GenerationResult {
    let started = Instant::now();

    let mut state = match backend.submit(request).await {
        Ok(Submission::Queued(handle)) => {
            tracing::info!(index = request.index, job = %handle, "Request queued");
            JobState::Submitted(handle)
        }
        Ok(Submission::Completed(artifact)) => JobState::Ready(artifact),
        Ok(Submission::Rejected(message)) => JobState::Failed(message),
        Err(e) => JobState::Failed(e.to_string()),
    };

    loop {
        state = match state {
            JobState::Submitted(handle) => poll_until_complete(backend, policy, &handle).await,
            JobState::Ready(artifact) => match backend.fetch(request, artifact).await {
                Ok(path) => JobState::Succeeded(path),
                Err(e) => JobState::Failed(e.to_string()),
            },
            JobState::Succeeded(path) => {
                tracing::info!(
                    index = request.index,
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request succeeded",
                );
                return GenerationResult::succeeded(request, path);
            }
            JobState::Failed(message) => {
                tracing::warn!(index = request.index, error = %message, "Request failed");
                return GenerationResult::failed(request, message);
            }
            JobState::TimedOut => {
                tracing::warn!(
                    index = request.index,
                    budget_secs = policy.budget.as_secs(),
                    "Request timed out",
                );
                return GenerationResult::failed(request, TIMEOUT_MESSAGE);
            }
        };
    }
}

/// Sleep-then-poll until the job completes or the budget elapses.
async fn poll_until_complete<B: GenerationBackend>(
    backend: &B,
    policy: PollPolicy,
    handle: &JobHandle,
) -> JobState<B::Artifact> {
    let started = Instant::now();
    while started.elapsed() < policy.budget {
        tokio::time::sleep(policy.interval).await;
        match backend.poll(handle).await {
            Ok(PollStatus::Complete(artifact)) => return JobState::Ready(artifact),
            Ok(PollStatus::Pending) => {}
            Err(e) => return JobState::Failed(e.to_string()),
        }
    }
    JobState::TimedOut
}
