//! Orchestration layer: drives generation backends through a
//! bounded-concurrency dispatcher and composes the end-to-end flows.
//!
//! - [`backend`] defines the submit / poll / fetch seam.
//! - [`dispatcher`] runs batches sequentially or through a worker pool.
//! - [`comfyui_backend`] and [`speech_backend`] adapt the two services.
//! - [`flows`] builds requests and post-processes results per command.

pub mod backend;
pub mod comfyui_backend;
pub mod dispatcher;
pub mod events;
pub mod flows;
pub mod speech_backend;
pub mod summary;
