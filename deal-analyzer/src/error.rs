//! Error taxonomy for analysis runs
//!
//! Only [`ConfigurationError`] and [`MediaError`] ever reach the caller as
//! failures. Everything raised once the pipeline is running is contained:
//! [`GenerationError`] per stage, [`ShapeError`] by the structured parser,
//! [`PipelineFatalError`] by the orchestrator's top-level guard.

use thiserror::Error;

/// Missing or malformed startup configuration; no run is possible
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{0} is required")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// A single call to the language model failed
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model endpoint unreachable: {0}")]
    Transport(String),

    #[error("model request rejected with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model response could not be read: {0}")]
    Malformed(String),

    #[error("model returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::Malformed(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

/// A structured stage answered without a usable payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("no fenced structured block in response")]
    MissingBlock,

    #[error("fenced block opened but never closed")]
    Unterminated,

    #[error("structured block did not decode: {0}")]
    Decode(String),
}

/// Anything that escaped the per-stage guards
#[derive(Debug, Error)]
pub enum PipelineFatalError {
    #[error("report assembly failed: {0}")]
    Assembly(#[from] serde_json::Error),

    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

/// Context preparation failed before the pipeline was invoked
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported file type: {0:?}")]
    UnsupportedFileType(String),

    #[error("file too large: {size_bytes} bytes (max {max_bytes})")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with failure: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    #[error("unexpected {tool} output: {message}")]
    Output { tool: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
