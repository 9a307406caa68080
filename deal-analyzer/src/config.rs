//! Runtime configuration
//!
//! Everything is read from the environment (after `.env` is loaded) with
//! defaults taken from the production deployment. Character budgets and token
//! limits are tuning knobs: changing them alters prompt size, not behavior.

use crate::error::ConfigurationError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Character budgets applied when one stage's output is embedded in another's prompt
#[derive(Debug, Clone, PartialEq)]
pub struct TruncationBudgets {
    pub classify_transcript: usize,
    pub classify_recognized_text: usize,
    pub qualitative_extraction: usize,
    pub risk_quantitative: usize,
    pub risk_qualitative: usize,
    pub comparative_extraction: usize,
    pub synthesis_extraction: usize,
    pub synthesis_quantitative: usize,
    pub synthesis_qualitative: usize,
    pub synthesis_risk: usize,
    pub synthesis_comparative: usize,
    pub visualization_quantitative: usize,
    pub visualization_risk: usize,
    pub visualization_synthesis: usize,
    pub chat_report: usize,
    /// Length of text payload previews kept in the stage log
    pub log_preview: usize,
}

impl Default for TruncationBudgets {
    fn default() -> Self {
        Self {
            classify_transcript: 2000,
            classify_recognized_text: 1000,
            qualitative_extraction: 2000,
            risk_quantitative: 1500,
            risk_qualitative: 1500,
            comparative_extraction: 1500,
            synthesis_extraction: 1000,
            synthesis_quantitative: 2000,
            synthesis_qualitative: 2000,
            synthesis_risk: 2000,
            synthesis_comparative: 1500,
            visualization_quantitative: 2000,
            visualization_risk: 1500,
            visualization_synthesis: 1500,
            chat_report: 15000,
            log_preview: 500,
        }
    }
}

/// Max output tokens requested from the model, per stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageTokenLimits {
    pub classification: u32,
    pub extraction: u32,
    pub quantitative: u32,
    pub qualitative: u32,
    pub risk: u32,
    pub comparative: u32,
    pub synthesis: u32,
    pub visualization: u32,
    pub chat: u32,
}

impl Default for StageTokenLimits {
    fn default() -> Self {
        Self {
            classification: 1024,
            extraction: 2048,
            quantitative: 4096,
            qualitative: 4096,
            risk: 4096,
            comparative: 3072,
            synthesis: 4096,
            visualization: 3072,
            chat: 2048,
        }
    }
}

/// Media preparation settings
#[derive(Debug, Clone, PartialEq)]
pub struct MediaConfig {
    pub max_file_size_mb: u64,
    pub frame_fps: u32,
    pub max_frames: usize,
    pub whisper_model: String,
    pub whisper_bin: String,
    pub ffmpeg_bin: String,
    pub tesseract_bin: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 500,
            frame_fps: 2,
            max_frames: 20,
            whisper_model: "base".to_string(),
            whisper_bin: "whisper".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            tesseract_bin: "tesseract".to_string(),
        }
    }
}

impl MediaConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Configuration for the gateway, the pipeline and the report cache
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub budgets: TruncationBudgets,
    pub max_tokens: StageTokenLimits,
    pub media: MediaConfig,
    pub database_path: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(300),
            budgets: TruncationBudgets::default(),
            max_tokens: StageTokenLimits::default(),
            media: MediaConfig::default(),
            database_path: default_database_path(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from the process environment
    ///
    /// Reads `.env` first. `ANTHROPIC_API_KEY` is mandatory.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigurationError::MissingCredential("ANTHROPIC_API_KEY"))?;

        if let Some(model) = lookup("DEAL_ANALYZER_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = lookup("ANTHROPIC_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("DEAL_ANALYZER_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("DEAL_ANALYZER_TIMEOUT_SECS", &raw)?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("MAX_FILE_SIZE_MB") {
            config.media.max_file_size_mb = parse_number("MAX_FILE_SIZE_MB", &raw)?;
        }
        if let Some(raw) = lookup("DEAL_ANALYZER_FRAME_FPS") {
            config.media.frame_fps = parse_number("DEAL_ANALYZER_FRAME_FPS", &raw)?;
        }
        if let Some(raw) = lookup("DEAL_ANALYZER_MAX_FRAMES") {
            config.media.max_frames = parse_number("DEAL_ANALYZER_MAX_FRAMES", &raw)?;
        }
        if let Some(model) = lookup("WHISPER_MODEL") {
            config.media.whisper_model = model;
        }
        if let Some(path) = lookup("DEAL_ANALYZER_DB") {
            config.database_path = PathBuf::from(path);
        }

        Ok(config)
    }
}

/// Report cache location without requiring the rest of the configuration
///
/// Commands that only read the cache have no use for an API key.
pub fn database_path_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    std::env::var("DEAL_ANALYZER_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_database_path())
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: &str,
) -> Result<T, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            key,
            value: raw.to_string(),
        })
}

fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deal-analyzer")
        .join("reports.db")
}
