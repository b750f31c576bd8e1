//! Typed view of a `/history/{prompt_id}` record.
//!
//! The history endpoint returns `{ "<prompt_id>": { "outputs": { "<node>":
//! { "images": [...] } }, ... } }`. Only the output descriptors are
//! modelled; other fields are ignored.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use sketchcast_core::types::JobHandle;

/// One file produced by an output node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputFile {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub folder_type: String,
}

impl OutputFile {
    /// Extension of the remote file including the dot, or `fallback`.
    pub fn extension_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match Path::new(&self.filename).extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => &self.filename[self.filename.len() - ext.len() - 1..],
            _ => fallback,
        }
    }
}

/// Output descriptors of a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<OutputFile>,
    #[serde(default)]
    pub videos: Vec<OutputFile>,
    #[serde(default)]
    pub gifs: Vec<OutputFile>,
}

/// Which descriptor lists count as the artifact of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// Still images (`images`).
    #[default]
    Image,
    /// Animated clips (`videos`, then `gifs`).
    Video,
}

impl OutputKind {
    /// Extension used when the remote filename has none.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Image => ".png",
            Self::Video => ".mp4",
        }
    }

    /// Message used when a finished job produced nothing of this kind.
    pub fn missing_message(&self) -> &'static str {
        match self {
            Self::Image => "No image output found",
            Self::Video => "No video output found",
        }
    }

    fn files<'a>(&self, node: &'a NodeOutput) -> Box<dyn Iterator<Item = &'a OutputFile> + 'a> {
        match self {
            Self::Image => Box::new(node.images.iter()),
            Self::Video => Box::new(node.videos.iter().chain(node.gifs.iter())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutput>,
}

impl HistoryEntry {
    /// Extract the record for `handle` from a full history response.
    ///
    /// Returns `Ok(None)` when the response has no record for the handle.
    pub fn from_history(
        body: &serde_json::Value,
        handle: &JobHandle,
    ) -> Result<Option<Self>, serde_json::Error> {
        match body.get(&handle.0) {
            Some(record) => Self::deserialize(record).map(Some),
            None => Ok(None),
        }
    }

    /// A record counts as finished once any node reported outputs.
    pub fn is_complete(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// First descriptor of `kind`, walking nodes in ascending id order.
    pub fn first_output(&self, kind: OutputKind) -> Option<&OutputFile> {
        let mut node_ids: Vec<&String> = self.outputs.keys().collect();
        node_ids.sort_by(|a, b| node_order(a).cmp(&node_order(b)));
        node_ids
            .into_iter()
            .filter_map(|id| self.outputs.get(id))
            .find_map(|node| kind.files(node).next())
    }
}

/// Numeric ids sort numerically and before any non-numeric id.
fn node_order(id: &str) -> (u8, u64, &str) {
    match id.parse::<u64>() {
        Ok(n) => (0, n, id),
        Err(_) => (1, 0, id),
    }
}
