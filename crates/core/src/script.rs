//! Scene script loading.
//!
//! A script is a JSON array of scenes, each pairing a visual prompt with
//! the narration spoken over it:
//!
//! ```json
//! [{ "scene_number": 1, "visual_prompt": "...", "voice_over": "..." }]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_number: u32,
    pub visual_prompt: String,
    pub voice_over: String,
}

/// Parse script JSON. `source_name` is only used in error messages.
pub fn parse_script(json: &str, source_name: &str) -> Result<Vec<Scene>, CoreError> {
    let scenes: Vec<Scene> = serde_json::from_str(json).map_err(|e| CoreError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;

    if scenes.is_empty() {
        return Err(CoreError::Parse {
            source_name: source_name.to_string(),
            message: "no scenes found in script".to_string(),
        });
    }
    if let Some(scene) = scenes.iter().find(|s| s.visual_prompt.trim().is_empty()) {
        return Err(CoreError::Parse {
            source_name: source_name.to_string(),
            message: format!("scene {} has an empty visual_prompt", scene.scene_number),
        });
    }
    Ok(scenes)
}

/// Read and parse a script file.
pub async fn load_script(path: &Path) -> Result<Vec<Scene>, CoreError> {
    let json = tokio::fs::read_to_string(path).await?;
    parse_script(&json, &path.display().to_string())
}
