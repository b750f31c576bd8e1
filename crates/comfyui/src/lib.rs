//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper (submit, history, download, liveness),
//! typed history parsing, and workflow-template patching for driving a
//! ComfyUI image-generation server by polling.

pub mod api;
pub mod history;
pub mod workflow;
