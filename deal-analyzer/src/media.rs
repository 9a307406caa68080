//! Media preparation: turn an uploaded file into an [`AnalysisContext`]
//!
//! Speech-to-text, frame sampling, OCR and base64 encoding are delegated to
//! external tools (`whisper`, `ffmpeg`, `tesseract`). Everything here runs
//! before the pipeline; its failures are [`MediaError`]s for the caller.

use crate::analysis::prompts::clock;
use crate::analysis::AnalysisContext;
use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::gateway::ImageAttachment;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "aac", "flac", "ogg", "wma", "aiff", "opus", "webm",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v", "mpeg", "mpg",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg", "heic", "ico",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Audio,
    Video,
    Image,
}

impl FileKind {
    /// Classify by extension; `webm` counts as audio
    pub fn from_path(path: &Path) -> Result<Self, MediaError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Image)
        } else {
            Err(MediaError::UnsupportedFileType(ext))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Audio => "audio",
            FileKind::Video => "video",
            FileKind::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(FileKind::Audio),
            "video" => Some(FileKind::Video),
            "image" => Some(FileKind::Image),
            _ => None,
        }
    }
}

/// A sampled video frame, base64 JPEG
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: String,
    pub timestamp_seconds: f64,
}

/// External media capabilities the context builder relies on
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Speech-to-text, one `[mm:ss - mm:ss] text` line per segment
    async fn transcribe(&self, path: &Path) -> Result<String, MediaError>;

    async fn sample_frames(
        &self,
        path: &Path,
        fps: u32,
        max_frames: usize,
    ) -> Result<Vec<Frame>, MediaError>;

    /// OCR over a still image
    async fn recognize_text(&self, path: &Path) -> Result<String, MediaError>;

    async fn to_base64(&self, path: &Path) -> Result<String, MediaError>;
}

/// [`MediaExtractor`] that shells out to whisper, ffmpeg and tesseract
pub struct CommandMediaExtractor {
    config: MediaConfig,
}

impl CommandMediaExtractor {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

fn format_segments(output: &WhisperOutput) -> String {
    if output.segments.is_empty() {
        return output.text.trim().to_string();
    }

    output
        .segments
        .iter()
        .map(|s| format!("[{} - {}] {}", clock(s.start), clock(s.end), s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run_tool(bin: &str, args: Vec<OsString>) -> Result<Output, MediaError> {
    debug!(tool = bin, ?args, "running media tool");

    let output = Command::new(bin)
        .args(&args)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            tool: bin.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::ToolFailed {
            tool: bin.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

#[async_trait]
impl MediaExtractor for CommandMediaExtractor {
    async fn transcribe(&self, path: &Path) -> Result<String, MediaError> {
        let workdir = tempfile::tempdir()?;
        let bin = &self.config.whisper_bin;

        run_tool(
            bin,
            vec![
                path.into(),
                "--model".into(),
                self.config.whisper_model.as_str().into(),
                "--output_format".into(),
                "json".into(),
                "--output_dir".into(),
                workdir.path().into(),
            ],
        )
        .await?;

        // whisper names its output after the input's stem
        let mut json_name = path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| OsString::from("transcript"));
        json_name.push(".json");
        let json_path = workdir.path().join(json_name);

        let raw = tokio::fs::read_to_string(&json_path).await?;
        let parsed: WhisperOutput = serde_json::from_str(&raw).map_err(|e| MediaError::Output {
            tool: bin.clone(),
            message: e.to_string(),
        })?;

        Ok(format_segments(&parsed))
    }

    async fn sample_frames(
        &self,
        path: &Path,
        fps: u32,
        max_frames: usize,
    ) -> Result<Vec<Frame>, MediaError> {
        let fps = fps.max(1);
        let workdir = tempfile::tempdir()?;
        let pattern = workdir.path().join("frame_%04d.jpg");

        run_tool(
            &self.config.ffmpeg_bin,
            vec![
                "-hide_banner".into(),
                "-loglevel".into(),
                "error".into(),
                "-i".into(),
                path.into(),
                "-vf".into(),
                format!("fps={}", fps).into(),
                "-frames:v".into(),
                max_frames.to_string().into(),
                "-q:v".into(),
                "2".into(),
                pattern.into(),
            ],
        )
        .await?;

        let mut files: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(workdir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) == Some("jpg") {
                files.push(file);
            }
        }
        files.sort();

        let mut frames = Vec::with_capacity(files.len().min(max_frames));
        for (i, file) in files.iter().take(max_frames).enumerate() {
            let bytes = tokio::fs::read(file).await?;
            frames.push(Frame {
                data: STANDARD.encode(bytes),
                timestamp_seconds: i as f64 / fps as f64,
            });
        }
        Ok(frames)
    }

    async fn recognize_text(&self, path: &Path) -> Result<String, MediaError> {
        let output = run_tool(
            &self.config.tesseract_bin,
            vec![path.into(), "stdout".into()],
        )
        .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn to_base64(&self, path: &Path) -> Result<String, MediaError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(STANDARD.encode(bytes))
    }
}

/// Media type sent with a still image
fn image_media_type(path: &Path) -> String {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let essence = guessed.essence_str();
    if essence.starts_with("image/") {
        essence.to_string()
    } else {
        "image/jpeg".to_string()
    }
}

/// Build the analysis context for `path`
///
/// Audio yields a transcript; video a transcript plus timestamped frames;
/// an image its OCR text plus the image itself, unannotated.
pub async fn prepare_context(
    extractor: &dyn MediaExtractor,
    path: &Path,
    user_query: &str,
    config: &MediaConfig,
) -> Result<(FileKind, AnalysisContext), MediaError> {
    let kind = FileKind::from_path(path)?;

    let size_bytes = tokio::fs::metadata(path).await?.len();
    let max_bytes = config.max_file_size_bytes();
    if size_bytes > max_bytes {
        return Err(MediaError::TooLarge {
            size_bytes,
            max_bytes,
        });
    }

    info!(path = %path.display(), kind = kind.as_str(), size_bytes, "preparing context");

    let mut context = AnalysisContext::new(user_query);
    match kind {
        FileKind::Audio => {
            context = context.with_transcript(extractor.transcribe(path).await?);
        }
        FileKind::Video => {
            context = context.with_transcript(extractor.transcribe(path).await?);
            let frames = extractor
                .sample_frames(path, config.frame_fps, config.max_frames)
                .await?;
            info!(frames = frames.len(), "frames sampled");
            for frame in frames {
                context = context.with_frame(ImageAttachment::jpeg(frame.data), frame.timestamp_seconds);
            }
        }
        FileKind::Image => {
            context = context.with_recognized_text(extractor.recognize_text(path).await?);
            let data = extractor.to_base64(path).await?;
            context = context.with_still_image(ImageAttachment {
                media_type: image_media_type(path),
                data,
            });
        }
    }

    Ok((kind, context))
}
