//! Stage execution with automatic logging and fail-soft fallbacks
//!
//! A stage never returns an error. A gateway failure turns into a placeholder
//! (text stages) or the stage's default value (structured stages), and the
//! run carries on with a `Degraded` status.

use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::fenced::parse_structured_payload;
use deal_analyzer_sdk::{log_stage_start, StageStatus};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Where a stage sits in the run
#[derive(Debug, Clone, Copy)]
pub struct StageContext {
    pub index: usize,
    pub name: &'static str,
    pub total: usize,
}

/// Output of one stage plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun<T> {
    pub output: T,
    pub status: StageStatus,
    /// Why the stage degraded, if it did
    pub note: Option<String>,
}

impl<T> StageRun<T> {
    pub fn completed(output: T) -> Self {
        Self {
            output,
            status: StageStatus::Completed,
            note: None,
        }
    }

    pub fn degraded(output: T, note: impl Into<String>) -> Self {
        Self {
            output,
            status: StageStatus::Degraded,
            note: Some(note.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == StageStatus::Degraded
    }

    /// Downgrade a completed run, keeping the output
    pub fn degrade(mut self, note: impl Into<String>) -> Self {
        self.status = StageStatus::Degraded;
        self.note = Some(note.into());
        self
    }
}

/// Text recorded in place of a failed text stage's output
pub fn error_placeholder(stage_name: &str, cause: impl std::fmt::Display) -> String {
    format!("Error: {} failed: {}", stage_name, cause)
}

/// Run a free-text stage
///
/// On gateway failure the output is [`error_placeholder`].
pub async fn run_text_stage(
    model: &dyn LanguageModel,
    ctx: StageContext,
    request: GenerationRequest,
) -> StageRun<String> {
    log_stage_start!(ctx.index, ctx.name, ctx.total);
    info!(stage = ctx.index, name = ctx.name, "running stage");
    debug!(
        stage = ctx.index,
        prompt_chars = request.prompt.chars().count(),
        images = request.images.len(),
        "stage request"
    );

    match model.generate(request).await {
        Ok(text) => StageRun::completed(text),
        Err(err) => {
            warn!(stage = ctx.index, name = ctx.name, error = %err, "stage generation failed");
            StageRun::degraded(error_placeholder(ctx.name, &err), err.to_string())
        }
    }
}

/// Run a stage whose response must carry a fenced structured block
///
/// Gateway failure and unusable payloads both yield `default`.
pub async fn run_structured_stage<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    ctx: StageContext,
    request: GenerationRequest,
    default: T,
) -> StageRun<T> {
    let text = run_text_stage(model, ctx, request).await;
    if text.is_degraded() {
        let note = text.note.unwrap_or_default();
        return StageRun::degraded(default, note);
    }

    let decoded = parse_structured_payload(&text.output, default);
    match decoded.fallback {
        None => StageRun::completed(decoded.value),
        Some(err) => {
            warn!(stage = ctx.index, name = ctx.name, "stage degraded to its default");
            StageRun::degraded(decoded.value, err.to_string())
        }
    }
}
