use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Prefix of every structured event line written to stderr
pub const EVENT_PREFIX: &str = "__DA_EVENT__:";

static EVENT_STREAM: AtomicBool = AtomicBool::new(false);

/// Turn on `__DA_EVENT__` lines for this process
pub fn enable_event_stream() {
    EVENT_STREAM.store(true, Ordering::SeqCst);
}

pub fn event_stream_enabled() -> bool {
    EVENT_STREAM.load(Ordering::SeqCst)
}

/// Outcome of a single stage as seen by progress consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage produced its expected output
    Completed,
    /// Stage fell back to a placeholder or default
    Degraded,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Completed => "completed",
            StageStatus::Degraded => "degraded",
        }
    }
}

/// Per-stage completion notice delivered to a [`ProgressSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage_index: usize,
    pub total_stages: usize,
    pub name: String,
    pub status: StageStatus,
    pub progress_percent: f64,
}

impl ProgressEvent {
    /// Build the event for a finished stage; percent is `(index + 1) / total * 100`
    pub fn new(
        stage_index: usize,
        total_stages: usize,
        name: impl Into<String>,
        status: StageStatus,
    ) -> Self {
        let progress_percent = if total_stages == 0 {
            100.0
        } else {
            (stage_index + 1) as f64 / total_stages as f64 * 100.0
        };

        Self {
            stage_index,
            total_stages,
            name: name.into(),
            status,
            progress_percent,
        }
    }

    pub fn is_final(&self) -> bool {
        self.stage_index + 1 >= self.total_stages
    }
}

/// Receives one event per completed stage, in order, never concurrently.
///
/// Implementations must return quickly: the pipeline calls `notify` inline
/// between two model invocations.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sender half of a bounded progress channel
///
/// Uses `try_send`, so a slow or absent consumer never stalls the pipeline.
/// An event that does not fit is dropped and logged.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

pub type ProgressReceiver = mpsc::Receiver<ProgressEvent>;

impl ProgressSink for ChannelSink {
    fn notify(&self, event: &ProgressEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    stage = dropped.stage_index,
                    "progress channel full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(stage = event.stage_index, "progress receiver gone");
            }
        }
    }
}

/// Create a bounded progress channel (capacity is clamped to at least 1)
pub fn progress_channel(capacity: usize) -> (ChannelSink, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx }, rx)
}

/// Structured logging events emitted by analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisLog {
    /// Run accepted and about to execute stage 0
    RunStarted {
        run_id: Uuid,
        total_stages: usize,
    },
    /// Stage started
    StageStarted {
        stage: usize,
        name: String,
        total_stages: usize,
    },
    /// Stage produced its expected output
    StageCompleted {
        stage: usize,
        name: String,
        summary: Option<String>,
    },
    /// Stage fell back to a placeholder or default
    StageDegraded {
        stage: usize,
        name: String,
        reason: String,
    },
    /// Report assembled
    RunCompleted {
        run_id: Uuid,
        elapsed_seconds: f64,
    },
    /// Top-level guard tripped; a degraded report was returned
    RunFailed {
        run_id: Uuid,
        error: String,
    },
}

impl AnalysisLog {
    /// Emit this event to stderr for external consumers, if enabled
    pub fn emit(&self) {
        if !event_stream_enabled() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse a stderr line produced by [`AnalysisLog::emit`]
    pub fn parse_line(line: &str) -> Option<Self> {
        line.strip_prefix(EVENT_PREFIX)
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

#[macro_export]
macro_rules! log_run_start {
    ($run_id:expr, $total:expr) => {
        $crate::AnalysisLog::RunStarted {
            run_id: $run_id,
            total_stages: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_run_complete {
    ($run_id:expr, $elapsed:expr) => {
        $crate::AnalysisLog::RunCompleted {
            run_id: $run_id,
            elapsed_seconds: $elapsed,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_run_failed {
    ($run_id:expr, $error:expr) => {
        $crate::AnalysisLog::RunFailed {
            run_id: $run_id,
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_stage_start {
    ($stage:expr, $name:expr, $total:expr) => {
        $crate::AnalysisLog::StageStarted {
            stage: $stage,
            name: $name.to_string(),
            total_stages: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $name:expr) => {
        $crate::AnalysisLog::StageCompleted {
            stage: $stage,
            name: $name.to_string(),
            summary: None,
        }
        .emit();
    };
    ($stage:expr, $name:expr, $summary:expr) => {
        $crate::AnalysisLog::StageCompleted {
            stage: $stage,
            name: $name.to_string(),
            summary: Some($summary.to_string()),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_stage_degraded {
    ($stage:expr, $name:expr, $reason:expr) => {
        $crate::AnalysisLog::StageDegraded {
            stage: $stage,
            name: $name.to_string(),
            reason: $reason.to_string(),
        }
        .emit();
    };
}
