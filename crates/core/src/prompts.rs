//! Sketch prompt construction and prompts-file parsing.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Prompt fragments
// ---------------------------------------------------------------------------

/// Style keywords appended to every sketch prompt.
pub const SKETCH_BASE: &str =
    "simple line drawing, white background, clean black lines, minimalist style, hand drawn sketch";

/// Default negative prompt for a one-off sketch.
pub const SKETCH_NEGATIVE_PROMPT: &str = "colored, photo realistic, complex background, shadows, \
     gradients, multiple subjects, blurry, low quality, detailed, realistic";

/// Negative prompt used for batch and scene images.
pub const BATCH_NEGATIVE_PROMPT: &str = "colored, photo realistic, complex background, shadows, \
     gradients, multiple subjects, blurry, low quality, detailed, realistic, watermark, text";

/// Subject framing applied on top of [`SKETCH_BASE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SketchStyle {
    #[default]
    Sketch,
    Character,
    Object,
    Scene,
}

impl SketchStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sketch => "sketch",
            Self::Character => "character",
            Self::Object => "object",
            Self::Scene => "scene",
        }
    }

    /// Extra keywords for this style; empty for plain sketches.
    pub fn addition(&self) -> &'static str {
        match self {
            Self::Sketch => "",
            Self::Character => "full body, cartoon style, friendly expression",
            Self::Object => "front view, children's book illustration",
            Self::Scene => "simple composition, minimalist",
        }
    }
}

impl fmt::Display for SketchStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SketchStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sketch" => Ok(Self::Sketch),
            "character" => Ok(Self::Character),
            "object" => Ok(Self::Object),
            "scene" => Ok(Self::Scene),
            other => Err(CoreError::Validation(format!(
                "Unknown style '{other}'. Must be one of: sketch, character, object, scene"
            ))),
        }
    }
}

/// Combine the user's subject with the style keywords and the sketch base.
///
/// ```
/// use sketchcast_core::prompts::{build_sketch_prompt, SketchStyle, SKETCH_BASE};
///
/// assert_eq!(build_sketch_prompt("a cat", SketchStyle::Sketch), format!("a cat, {SKETCH_BASE}"));
/// ```
pub fn build_sketch_prompt(user_prompt: &str, style: SketchStyle) -> String {
    match style.addition() {
        "" => format!("{user_prompt}, {SKETCH_BASE}"),
        addition => format!("{user_prompt}, {addition}, {SKETCH_BASE}"),
    }
}

// ---------------------------------------------------------------------------
// Prompts file
// ---------------------------------------------------------------------------

/// One named prompt from a prompts file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEntry {
    pub name: String,
    pub prompt: String,
}

/// Parse the prompts-file format:
///
/// ```text
/// # comment
/// opening_shot:
///   A lone hiker at the trailhead,
///   morning fog
/// ```
///
/// A line ending in `:` with no leading space starts an entry; following
/// lines are joined with single spaces. Blank lines and `#` comments are
/// skipped, as are lines before the first header and headers without
/// text. A repeated name replaces the earlier text but keeps its position.
pub fn parse_prompts(content: &str) -> Vec<PromptEntry> {
    let mut entries: Vec<PromptEntry> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for raw in content.lines() {
        let line = raw.trim_end();
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        if line.ends_with(':') && !line.starts_with(' ') {
            if let Some((name, parts)) = current.take() {
                push_entry(&mut entries, name, &parts);
            }
            let name = line[..line.len() - 1].trim().to_string();
            current = Some((name, Vec::new()));
        } else if let Some((_, parts)) = current.as_mut() {
            parts.push(stripped);
        }
    }

    if let Some((name, parts)) = current {
        push_entry(&mut entries, name, &parts);
    }
    entries
}

/// Read and parse a prompts file.
pub async fn load_prompts_file(path: &Path) -> Result<Vec<PromptEntry>, CoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_prompts(&content))
}

fn push_entry(entries: &mut Vec<PromptEntry>, name: String, parts: &[&str]) {
    if parts.is_empty() || name.is_empty() {
        return;
    }
    let prompt = parts.join(" ");
    match entries.iter_mut().find(|e| e.name == name) {
        Some(existing) => existing.prompt = prompt,
        None => entries.push(PromptEntry { name, prompt }),
    }
}
