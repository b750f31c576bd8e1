//! Client for OpenAI-compatible text-to-speech endpoints.
//!
//! Supports the official API (`tts-1`, API key required) and
//! self-hosted compatible servers (`gpt-4o-mini-tts`, no key). Audio is
//! requested as raw PCM and streamed straight to disk.

pub mod api;
