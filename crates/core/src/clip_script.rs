//! Clip script parsing: one animated clip per line.
//!
//! ```text
//! # opening
//! A hiker ties their boots (2s)
//! Fog rolls over the ridge - 3 sec
//! A map unfolds on a rock
//! ```
//!
//! A duration is given either in trailing parentheses or after ` - `,
//! with an optional `s` / `sec` unit. Lines without one last
//! [`DEFAULT_CLIP_DURATION`] seconds.

use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;

/// Seconds used when a line carries no duration.
pub const DEFAULT_CLIP_DURATION: f64 = 2.0;

/// Negative prompt applied to every scripted clip.
pub const CLIP_NEGATIVE_PROMPT: &str =
    "colored, realistic, complex background, shadows, multiple characters";

/// One clip definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipLine {
    /// 1-based line number in the script file.
    pub line: usize,
    pub description: String,
    pub duration: f64,
}

impl ClipLine {
    /// Line-drawing prompt for this clip's description.
    pub fn prompt(&self) -> String {
        format!(
            "simple line drawing of {}, white background, clean black lines, \
             minimalist sketch, hand drawn style",
            self.description
        )
    }
}

/// Parse a clip script. Blank lines and `#` comments are skipped.
///
/// `source_name` only labels parse errors.
pub fn parse_clip_script(content: &str, source_name: &str) -> Result<Vec<ClipLine>, CoreError> {
    let mut clips = Vec::new();

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (description, duration) = match split_duration(line) {
            Some((description, duration)) => {
                let duration = parse_duration(duration).ok_or_else(|| CoreError::Parse {
                    source_name: source_name.to_string(),
                    message: format!("line {}: invalid duration '{duration}'", number + 1),
                })?;
                (description, duration)
            }
            None => (line, DEFAULT_CLIP_DURATION),
        };

        clips.push(ClipLine {
            line: number + 1,
            description: description.to_string(),
            duration,
        });
    }

    Ok(clips)
}

/// Read and parse a clip script file.
pub async fn load_clip_script(path: &Path) -> Result<Vec<ClipLine>, CoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_clip_script(&content, &path.display().to_string())
}

/// `("desc", "2s")` for `desc (2s)` or `desc - 2s`.
fn split_duration(line: &str) -> Option<(&str, &str)> {
    if let (Some(open), Some(close)) = (line.rfind('('), line.rfind(')')) {
        if open < close {
            return Some((line[..open].trim(), &line[open + 1..close]));
        }
    }
    line.split_once(" - ")
        .map(|(description, duration)| (description.trim(), duration))
}

fn parse_duration(raw: &str) -> Option<f64> {
    let value = raw.replace("sec", "").replace('s', "");
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
