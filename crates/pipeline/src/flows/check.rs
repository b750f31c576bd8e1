//! Installation check: external tools, services and workflow files.

use std::fmt;
use std::path::Path;

use sketchcast_comfyui::api::ComfyUIApi;
use sketchcast_comfyui::workflow::WorkflowTemplate;
use sketchcast_core::config::PipelineConfig;
use sketchcast_core::ffmpeg::Ffmpeg;
use sketchcast_speech::api::SpeechApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    /// Optional or not currently running; generation may still work later.
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckItem {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CheckItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        };
        write!(f, "{mark} {}: {}", self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn passed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == CheckStatus::Ok)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.status == CheckStatus::Error)
    }
}

/// Run every check against `config`.
pub async fn run_checks(config: &PipelineConfig) -> CheckReport {
    let items = vec![
        check_ffmpeg(&Ffmpeg::new(&config.ffmpeg_bin)).await,
        check_workflow("Image workflow", &config.workflow_path).await,
        check_workflow("Clip workflow", &config.clip_workflow_path).await,
        check_comfyui(&ComfyUIApi::new(&config.comfyui_url)).await,
        check_speech(&SpeechApi::open_source(&config.speech_base_url)).await,
    ];
    CheckReport { items }
}

async fn check_ffmpeg(ffmpeg: &Ffmpeg) -> CheckItem {
    match ffmpeg.check_available().await {
        Ok(version) => CheckItem::new("ffmpeg", CheckStatus::Ok, version),
        Err(e) => CheckItem::new("ffmpeg", CheckStatus::Error, e.to_string()),
    }
}

async fn check_workflow(name: &'static str, path: &Path) -> CheckItem {
    if !path.exists() {
        return CheckItem::new(
            name,
            CheckStatus::Warning,
            format!("not found: {}", path.display()),
        );
    }
    match WorkflowTemplate::load(path).await {
        Ok(template) => CheckItem::new(
            name,
            CheckStatus::Ok,
            format!("{} ({:?} format)", path.display(), template.format()),
        ),
        Err(e) => CheckItem::new(name, CheckStatus::Error, format!("{}: {e}", path.display())),
    }
}

async fn check_comfyui(api: &ComfyUIApi) -> CheckItem {
    match api.system_stats().await {
        Ok(_) => CheckItem::new(
            "ComfyUI server",
            CheckStatus::Ok,
            format!("running at {}", api.api_url()),
        ),
        Err(e) => CheckItem::new(
            "ComfyUI server",
            CheckStatus::Warning,
            format!("not responding at {}: {e}", api.api_url()),
        ),
    }
}

async fn check_speech(api: &SpeechApi) -> CheckItem {
    match api.health().await {
        Ok(()) => CheckItem::new(
            "TTS server",
            CheckStatus::Ok,
            format!("running at {}", api.base_url()),
        ),
        Err(e) => CheckItem::new(
            "TTS server",
            CheckStatus::Warning,
            format!("not responding at {}: {e}", api.base_url()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_workflow_is_a_warning() {
        let item =
            check_workflow("Image workflow", Path::new("/nonexistent/basic_image.json")).await;
        assert_eq!(item.status, CheckStatus::Warning);
        assert!(item.detail.contains("not found"));
    }

    #[tokio::test]
    async fn malformed_workflow_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let item = check_workflow("Image workflow", &path).await;
        assert_eq!(item.status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_an_error() {
        let item = check_ffmpeg(&Ffmpeg::new("/nonexistent/ffmpeg")).await;
        assert_eq!(item.status, CheckStatus::Error);
    }

    #[test]
    fn report_counts() {
        let report = CheckReport {
            items: vec![
                CheckItem::new("a", CheckStatus::Ok, ""),
                CheckItem::new("b", CheckStatus::Warning, ""),
            ],
        };
        assert_eq!(report.passed(), 1);
        assert!(!report.has_errors());
        assert_eq!(report.items[0].to_string(), "✓ a: ");
    }
}
