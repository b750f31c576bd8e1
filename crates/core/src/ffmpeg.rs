//! FFmpeg command wrappers for transcoding, audio merging and video assembly.
//!
//! Every operation shells out to the configured `ffmpeg` binary through
//! [`tokio::process::Command`]. Intermediate files (raw PCM, concat
//! lists) are removed only after a successful run so failures can be
//! inspected.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Name of the concat demuxer list written next to the output file.
pub const CONCAT_LIST_FILE_NAME: &str = "concat_list.txt";

/// Raw PCM format produced by the speech backend.
pub const PCM_SAMPLE_RATE: u32 = 24_000;

/// MP3 bitrate for narration output.
pub const MP3_BITRATE: &str = "192k";

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("no input files to {0}")]
    NoInputs(&'static str),

    #[error("input file not found: {0}")]
    InputNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One entry of a video concat list.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub path: PathBuf,
    /// Display time for still images; `None` for video clips.
    pub still_duration: Option<f64>,
}

impl MediaInput {
    /// Classify `path` by extension; stills get `image_duration` seconds.
    pub fn from_path(path: PathBuf, image_duration: f64) -> Self {
        let still_duration = is_image(&path).then_some(image_duration);
        Self {
            path,
            still_duration,
        }
    }
}

/// Handle on an `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    bin: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run `ffmpeg -version` and return the first line of its output.
    pub async fn check_available(&self) -> Result<String, FfmpegError> {
        let stdout = self.run(vec!["-version".into()]).await?;
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    /// Transcode raw 24 kHz mono s16le PCM to MP3.
    ///
    /// The PCM file is deleted on success and kept on failure.
    pub async fn transcode_pcm_to_mp3(&self, pcm: &Path, mp3: &Path) -> Result<(), FfmpegError> {
        self.run(transcode_args(pcm, mp3)).await?;
        tokio::fs::remove_file(pcm).await?;
        tracing::debug!(pcm = %pcm.display(), mp3 = %mp3.display(), "Transcoded PCM to MP3");
        Ok(())
    }

    /// Concatenate audio files into `output` (re-encoded as MP3).
    ///
    /// A single input is simply renamed. On success the concat list and
    /// the input files are removed.
    pub async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
        match inputs {
            [] => Err(FfmpegError::NoInputs("concatenate")),
            [single] => {
                tokio::fs::rename(single, output).await?;
                Ok(())
            }
            _ => {
                let entries: Vec<MediaInput> = inputs
                    .iter()
                    .map(|p| MediaInput {
                        path: p.clone(),
                        still_duration: None,
                    })
                    .collect();
                let list = write_concat_list(&entries, output).await?;

                let mut args = concat_input_args(&list);
                args.extend(
                    ["-codec:a", "libmp3lame", "-b:a", MP3_BITRATE, "-y"].map(OsString::from),
                );
                args.push(output.into());
                self.run(args).await?;

                tokio::fs::remove_file(&list).await?;
                for input in inputs {
                    tokio::fs::remove_file(input).await?;
                }
                tracing::info!(chunks = inputs.len(), output = %output.display(), "Merged audio");
                Ok(())
            }
        }
    }

    /// Concatenate clips and stills into an H.264 video, optionally
    /// muxing `voiceover` as the audio track (trimmed to the shorter
    /// stream).
    pub async fn assemble_video(
        &self,
        inputs: &[MediaInput],
        voiceover: Option<&Path>,
        output: &Path,
        fps: u32,
    ) -> Result<(), FfmpegError> {
        if inputs.is_empty() {
            return Err(FfmpegError::NoInputs("assemble"));
        }
        let voiceover = match voiceover {
            Some(path) => Some(absolute(path).await?),
            None => None,
        };

        let list = write_concat_list(inputs, output).await?;
        self.run(assemble_args(&list, voiceover.as_deref(), output, fps))
            .await?;
        tokio::fs::remove_file(&list).await?;

        tracing::info!(
            inputs = inputs.len(),
            voiceover = voiceover.is_some(),
            output = %output.display(),
            "Assembled video",
        );
        Ok(())
    }

    // ---- private helpers ----

    /// Execute ffmpeg with `args`, returning stdout on a zero exit.
    async fn run(&self, args: Vec<OsString>) -> Result<String, FfmpegError> {
        tracing::debug!(bin = %self.bin.display(), ?args, "Running ffmpeg");

        let output = tokio::process::Command::new(&self.bin)
            .args(&args)
            .output()
            .await
            .map_err(FfmpegError::NotFound)?;

        if !output.status.success() {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Video clips in `dir`: sorted `*.mp4` files followed by sorted `*.mov`.
pub async fn collect_clips(dir: &Path) -> Result<Vec<PathBuf>, FfmpegError> {
    let mut mp4 = Vec::new();
    let mut mov = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("mp4") => mp4.push(path),
            Some("mov") => mov.push(path),
            _ => {}
        }
    }

    mp4.sort();
    mov.sort();
    mp4.extend(mov);
    Ok(mp4)
}

// ---------------------------------------------------------------------------
// Argument and list builders
// ---------------------------------------------------------------------------

fn transcode_args(pcm: &Path, mp3: &Path) -> Vec<OsString> {
    let rate = PCM_SAMPLE_RATE.to_string();
    let mut args: Vec<OsString> = ["-f", "s16le", "-ar", rate.as_str(), "-ac", "1", "-i"]
        .map(OsString::from)
        .to_vec();
    args.push(pcm.into());
    args.extend(["-codec:a", "libmp3lame", "-b:a", MP3_BITRATE, "-y"].map(OsString::from));
    args.push(mp3.into());
    args
}

fn concat_input_args(list: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-f", "concat", "-safe", "0", "-i"]
        .map(OsString::from)
        .to_vec();
    args.push(list.into());
    args
}

fn assemble_args(list: &Path, voiceover: Option<&Path>, output: &Path, fps: u32) -> Vec<OsString> {
    let mut args = concat_input_args(list);
    if let Some(audio) = voiceover {
        args.push("-i".into());
        args.push(audio.into());
        args.extend(
            [
                "-c:v", "libx264", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest",
            ]
            .map(OsString::from),
        );
    } else {
        args.extend(["-c:v", "libx264"].map(OsString::from));
    }
    let fps = fps.to_string();
    args.extend(["-pix_fmt", "yuv420p", "-r", fps.as_str(), "-y"].map(OsString::from));
    args.push(output.into());
    args
}

/// Render concat demuxer lines for already-absolute paths.
///
/// The last still is listed a second time without a duration so the
/// demuxer honours its display time.
fn render_concat_list(inputs: &[MediaInput]) -> String {
    let mut out = String::new();
    for input in inputs {
        out.push_str(&format!("file '{}'\n", escape_concat_path(&input.path)));
        if let Some(secs) = input.still_duration {
            out.push_str(&format!("duration {secs}\n"));
        }
    }
    if let Some(last) = inputs.last().filter(|i| i.still_duration.is_some()) {
        out.push_str(&format!("file '{}'\n", escape_concat_path(&last.path)));
    }
    out
}

async fn write_concat_list(inputs: &[MediaInput], output: &Path) -> Result<PathBuf, FfmpegError> {
    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        resolved.push(MediaInput {
            path: absolute(&input.path).await?,
            still_duration: input.still_duration,
        });
    }

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await?;
    let list = dir.join(CONCAT_LIST_FILE_NAME);
    tokio::fs::write(&list, render_concat_list(&resolved)).await?;
    Ok(list)
}

async fn absolute(path: &Path) -> Result<PathBuf, FfmpegError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|_| FfmpegError::InputNotFound(path.display().to_string()))
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn transcode_args_describe_raw_pcm() {
        let args = strings(&transcode_args(Path::new("a.pcm"), Path::new("a.mp3")));
        assert_eq!(
            args,
            vec![
                "-f", "s16le", "-ar", "24000", "-ac", "1", "-i", "a.pcm", "-codec:a",
                "libmp3lame", "-b:a", "192k", "-y", "a.mp3"
            ]
        );
    }

    #[test]
    fn assemble_args_map_voiceover_track() {
        let args = strings(&assemble_args(
            Path::new("list.txt"),
            Some(Path::new("/v/voice.mp3")),
            Path::new("final.mp4"),
            30,
        ));
        let joined = args.join(" ");
        assert!(joined.starts_with("-f concat -safe 0 -i list.txt -i /v/voice.mp3"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0 -shortest"));
        assert!(joined.ends_with("-pix_fmt yuv420p -r 30 -y final.mp4"));
    }

    #[test]
    fn assemble_args_without_voiceover() {
        let args = strings(&assemble_args(Path::new("l.txt"), None, Path::new("o.mp4"), 24));
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn concat_list_repeats_last_still() {
        let list = render_concat_list(&[
            MediaInput::from_path("/a/clip.mp4".into(), 5.0),
            MediaInput::from_path("/a/scene-1.png".into(), 5.0),
        ]);
        assert_eq!(
            list,
            "file '/a/clip.mp4'\nfile '/a/scene-1.png'\nduration 5\nfile '/a/scene-1.png'\n"
        );
    }

    #[test]
    fn concat_list_escapes_quotes() {
        let list = render_concat_list(&[MediaInput::from_path("/a/it's.mp4".into(), 5.0)]);
        assert_eq!(list, "file '/a/it'\\''s.mp4'\n");
    }

    #[test]
    fn image_detection_is_case_insensitive() {
        assert!(is_image(Path::new("x.PNG")));
        assert!(!is_image(Path::new("x.mov")));
        assert!(!is_image(Path::new("noext")));
    }

    #[tokio::test]
    async fn collects_mp4_before_mov_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mov", "a.mp4", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"").await.unwrap();
        }
        let clips = collect_clips(dir.path()).await.unwrap();
        let names: Vec<String> = clips
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "a.mov"]);
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg-binary");
        assert_matches!(ffmpeg.check_available().await, Err(FfmpegError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_transcode_keeps_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let pcm = dir.path().join("chunk.pcm");
        tokio::fs::write(&pcm, [0u8; 16]).await.unwrap();

        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg-binary");
        let result = ffmpeg.transcode_pcm_to_mp3(&pcm, &dir.path().join("chunk.mp3")).await;

        assert_matches!(result, Err(FfmpegError::NotFound(_)));
        assert!(pcm.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_execution_failed() {
        let ffmpeg = Ffmpeg::new("false");
        assert_matches!(
            ffmpeg.check_available().await,
            Err(FfmpegError::ExecutionFailed { exit_code: Some(1), .. })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_concat_removes_list_and_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = (1..=2)
            .map(|i| dir.path().join(format!("chunk_{i:03}.mp3")))
            .collect();
        for input in &inputs {
            tokio::fs::write(input, b"mp3").await.unwrap();
        }

        // `true` stands in for an ffmpeg that exits cleanly.
        let ffmpeg = Ffmpeg::new("true");
        ffmpeg
            .concat_audio(&inputs, &dir.path().join("voiceover.mp3"))
            .await
            .unwrap();

        assert!(!dir.path().join(CONCAT_LIST_FILE_NAME).exists());
        assert!(inputs.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn single_input_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let chunk = dir.path().join("chunk_001.mp3");
        tokio::fs::write(&chunk, b"mp3").await.unwrap();
        let output = dir.path().join("voiceover.mp3");

        Ffmpeg::new("/nonexistent/ffmpeg-binary")
            .concat_audio(std::slice::from_ref(&chunk), &output)
            .await
            .unwrap();

        assert!(output.exists());
        assert!(!chunk.exists());
    }

    #[tokio::test]
    async fn missing_voiceover_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        tokio::fs::write(&clip, b"").await.unwrap();

        let result = Ffmpeg::default()
            .assemble_video(
                &[MediaInput::from_path(clip, 5.0)],
                Some(dir.path().join("missing.mp3").as_path()),
                &dir.path().join("out.mp4"),
                24,
            )
            .await;
        assert_matches!(result, Err(FfmpegError::InputNotFound(_)));
    }
}
