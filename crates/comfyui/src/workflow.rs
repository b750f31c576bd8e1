//! Workflow template loading and parameter patching.
//!
//! Templates come in two shapes:
//!
//! * **UI format**, as saved from the ComfyUI editor: `{ "nodes": [...],
//!   "links": [...] }` with positional `widgets_values`. The fixed
//!   node ids of the sketch template are patched, then the graph is
//!   converted to API format.
//! * **API format**: `{ "<id>": { "class_type": ..., "inputs": {...} } }`.
//!   Fields are patched by node class; the prompt encoders are located
//!   through the sampler's `positive`/`negative` links.

use std::path::Path;

use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Node classes and fixed template ids
// ---------------------------------------------------------------------------

const CHECKPOINT_LOADER_CLASS: &str = "CheckpointLoaderSimple";
const CLIP_TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";
const EMPTY_LATENT_CLASS: &str = "EmptyLatentImage";
const KSAMPLER_CLASS: &str = "KSampler";
const SAVE_IMAGE_CLASS: &str = "SaveImage";

const POSITIVE_NODE_ID: u64 = 2;
const NEGATIVE_NODE_ID: u64 = 3;
const LATENT_NODE_ID: u64 = 4;
const SAMPLER_NODE_ID: u64 = 5;
const SAVE_NODE_ID: u64 = 7;

const SAMPLER_NAME: &str = "dpmpp_2m";
const SCHEDULER: &str = "karras";
const DENOISE: f64 = 1.0;

/// Errors from template loading and conversion.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to read workflow template: {0}")]
    Io(#[from] std::io::Error),

    #[error("workflow template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid workflow template: {0}")]
    Invalid(String),
}

/// Shape of a loaded template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Ui,
    Api,
}

/// Values substituted into a template for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowParams {
    pub checkpoint: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub seed: u64,
    pub steps: u32,
    pub cfg: f32,
    pub filename_prefix: String,
}

/// A parsed workflow template, rendered once per request.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    raw: Value,
    format: TemplateFormat,
}

impl WorkflowTemplate {
    pub async fn load(path: &Path) -> Result<Self, WorkflowError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_value(serde_json::from_str(&text)?)
    }

    pub fn from_value(raw: Value) -> Result<Self, WorkflowError> {
        let format = detect_format(&raw)?;
        Ok(Self { raw, format })
    }

    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    /// Produce the API-format body for one request.
    pub fn render(&self, params: &WorkflowParams) -> Result<Value, WorkflowError> {
        let mut workflow = self.raw.clone();
        match self.format {
            TemplateFormat::Ui => {
                patch_ui_nodes(&mut workflow, params);
                ui_to_api(&workflow)
            }
            TemplateFormat::Api => {
                patch_api_nodes(&mut workflow, params);
                Ok(workflow)
            }
        }
    }
}

fn detect_format(raw: &Value) -> Result<TemplateFormat, WorkflowError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| WorkflowError::Invalid("template must be a JSON object".into()))?;

    if obj.get("nodes").is_some_and(Value::is_array) {
        return Ok(TemplateFormat::Ui);
    }
    if !obj.is_empty() && obj.values().all(|node| node.get("class_type").is_some()) {
        return Ok(TemplateFormat::Api);
    }
    Err(WorkflowError::Invalid(
        "expected a UI workflow with 'nodes' or an API workflow keyed by node id".into(),
    ))
}

// ---------------------------------------------------------------------------
// UI format
// ---------------------------------------------------------------------------

/// Overwrite the widget values of the sketch template's fixed nodes.
fn patch_ui_nodes(workflow: &mut Value, params: &WorkflowParams) {
    let Some(nodes) = workflow.get_mut("nodes").and_then(Value::as_array_mut) else {
        return;
    };

    for node in nodes {
        let id = node.get("id").and_then(Value::as_u64);
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();

        let widgets = match (id, node_type) {
            (_, CHECKPOINT_LOADER_CLASS) => json!([params.checkpoint]),
            (Some(POSITIVE_NODE_ID), CLIP_TEXT_ENCODE_CLASS) => json!([params.prompt]),
            (Some(NEGATIVE_NODE_ID), CLIP_TEXT_ENCODE_CLASS) => json!([params.negative_prompt]),
            (Some(LATENT_NODE_ID), EMPTY_LATENT_CLASS) => {
                json!([params.width, params.height, params.batch_size])
            }
            (Some(SAMPLER_NODE_ID), KSAMPLER_CLASS) => json!([
                params.seed,
                "fixed",
                params.steps,
                params.cfg,
                SAMPLER_NAME,
                SCHEDULER,
                DENOISE
            ]),
            (Some(SAVE_NODE_ID), SAVE_IMAGE_CLASS) => json!([params.filename_prefix]),
            _ => continue,
        };
        node["widgets_values"] = widgets;
    }
}

/// Convert a UI-format graph to the API format accepted by `/prompt`.
///
/// Widget values are mapped to named inputs for the node classes the
/// sketch template uses; linked inputs become `[source_id, slot]`.
pub fn ui_to_api(workflow: &Value) -> Result<Value, WorkflowError> {
    let nodes = workflow
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| WorkflowError::Invalid("UI workflow has no 'nodes' array".into()))?;

    // link id -> (source node, source slot)
    let mut links = std::collections::HashMap::new();
    for link in workflow
        .get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let fields = link.as_array().filter(|f| f.len() >= 5).ok_or_else(|| {
            WorkflowError::Invalid(format!("malformed link entry: {link}"))
        })?;
        if let (Some(link_id), Some(source)) = (fields[0].as_u64(), fields[1].as_u64()) {
            links.insert(link_id, (source, fields[2].clone()));
        }
    }

    let mut api = Map::new();
    for node in nodes {
        let id = node
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| WorkflowError::Invalid(format!("node without numeric id: {node}")))?;
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();
        let class_type = node
            .get("class_type")
            .and_then(Value::as_str)
            .unwrap_or(node_type);

        let mut inputs = Map::new();
        if let Some(widgets) = node.get("widgets_values").and_then(Value::as_array) {
            map_widgets(id, node_type, widgets, &mut inputs)?;
        }

        for input in node
            .get("inputs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let (Some(name), Some(link_id)) = (
                input.get("name").and_then(Value::as_str),
                input.get("link").and_then(Value::as_u64),
            ) else {
                continue;
            };
            if let Some((source, slot)) = links.get(&link_id) {
                inputs.insert(name.to_string(), json!([source.to_string(), slot]));
            }
        }

        api.insert(
            id.to_string(),
            json!({ "inputs": inputs, "class_type": class_type }),
        );
    }

    Ok(Value::Object(api))
}

fn map_widgets(
    id: u64,
    node_type: &str,
    widgets: &[Value],
    inputs: &mut Map<String, Value>,
) -> Result<(), WorkflowError> {
    let widget = |i: usize| {
        widgets.get(i).cloned().ok_or_else(|| {
            WorkflowError::Invalid(format!(
                "node {id} ({node_type}) is missing widget value {i}"
            ))
        })
    };

    match node_type {
        CHECKPOINT_LOADER_CLASS => {
            inputs.insert("ckpt_name".into(), widget(0)?);
        }
        CLIP_TEXT_ENCODE_CLASS => {
            inputs.insert("text".into(), widget(0)?);
        }
        EMPTY_LATENT_CLASS => {
            inputs.insert("width".into(), widget(0)?);
            inputs.insert("height".into(), widget(1)?);
            inputs.insert("batch_size".into(), widget(2).unwrap_or(json!(1)));
        }
        KSAMPLER_CLASS => {
            // Index 1 is the UI-only "control after generate" widget.
            inputs.insert("seed".into(), widget(0)?);
            inputs.insert("steps".into(), widget(2)?);
            inputs.insert("cfg".into(), widget(3)?);
            inputs.insert("sampler_name".into(), widget(4)?);
            inputs.insert("scheduler".into(), widget(5)?);
            inputs.insert("denoise".into(), widget(6).unwrap_or(json!(DENOISE)));
        }
        SAVE_IMAGE_CLASS => {
            inputs.insert("filename_prefix".into(), widget(0)?);
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// API format
// ---------------------------------------------------------------------------

fn patch_api_nodes(workflow: &mut Value, params: &WorkflowParams) {
    let Some(nodes) = workflow.as_object_mut() else {
        return;
    };

    // Prompt encoders are whatever the sampler's conditioning inputs link to.
    let linked = |node: &Value, input: &str| -> Option<String> {
        node.pointer(&format!("/inputs/{input}/0"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let (positive_id, negative_id) = nodes
        .values()
        .find(|n| class_of(n) == KSAMPLER_CLASS)
        .map(|sampler| (linked(sampler, "positive"), linked(sampler, "negative")))
        .unwrap_or_default();

    for (id, node) in nodes.iter_mut() {
        let class = class_of(node).to_string();
        let Some(inputs) = node.get_mut("inputs").and_then(Value::as_object_mut) else {
            continue;
        };

        match class.as_str() {
            CHECKPOINT_LOADER_CLASS => {
                inputs.insert("ckpt_name".into(), json!(params.checkpoint));
            }
            CLIP_TEXT_ENCODE_CLASS if positive_id.as_deref() == Some(id.as_str()) => {
                inputs.insert("text".into(), json!(params.prompt));
            }
            CLIP_TEXT_ENCODE_CLASS if negative_id.as_deref() == Some(id.as_str()) => {
                inputs.insert("text".into(), json!(params.negative_prompt));
            }
            EMPTY_LATENT_CLASS => {
                inputs.insert("width".into(), json!(params.width));
                inputs.insert("height".into(), json!(params.height));
                inputs.insert("batch_size".into(), json!(params.batch_size));
            }
            KSAMPLER_CLASS => {
                inputs.insert("seed".into(), json!(params.seed));
                inputs.insert("steps".into(), json!(params.steps));
                inputs.insert("cfg".into(), json!(params.cfg));
            }
            _ => {}
        }

        if inputs.contains_key("filename_prefix") {
            inputs.insert("filename_prefix".into(), json!(params.filename_prefix));
        }
    }
}

fn class_of(node: &Value) -> &str {
    node.get("class_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
}
