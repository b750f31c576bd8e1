//! Progress events published while a batch is dispatched.
//!
//! Events are sent on a [`tokio::sync::broadcast`] channel owned by the
//! [`Dispatcher`](crate::dispatcher::Dispatcher); subscribe before calling
//! `run` to see every event. `Finished` events arrive in completion
//! order, which differs from index order in parallel mode.

use std::time::Duration;

use serde::Serialize;
use sketchcast_core::types::GenerationResult;

#[derive(Debug, Clone, Serialize)]
pub enum DispatchEvent {
    /// The liveness probe passed and dispatch is starting.
    BatchStarted { total: usize, service: &'static str },

    /// A request was picked up.
    Started {
        index: usize,
        name: String,
        total: usize,
    },

    /// A request reached a terminal state. `completed` counts results
    /// delivered so far, including this one.
    Finished {
        completed: usize,
        total: usize,
        result: GenerationResult,
    },

    /// Sequential mode is pausing before the next request.
    Waiting { delay: Duration },
}
