//! Pipeline orchestration
//!
//! Runs the eight stages strictly in order, threads each output into the
//! next stage, records one [`StageResult`] per stage and notifies the progress
//! sink after each one. A stage failure degrades that stage only; anything
//! that escapes the stages (a panic, a report serialization error) is caught
//! by the top-level guard and turned into a failure report that still carries
//! the partial stage log.
//!
//! The primary entry points are [`AnalysisPipeline::run`] and
//! [`AnalysisPipeline::spawn`].

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use deal_analyzer_sdk::{
    log_run_complete, log_run_failed, log_run_start, log_stage_complete, log_stage_degraded,
    progress_channel, ProgressEvent, ProgressReceiver, ProgressSink, StageStatus,
};

use crate::analysis::{
    prompts::TemplateFamily,
    report::{assemble_final_report, failure_report, ReportSections},
    stage0_classify, stage1_extract, stage2_quantitative, stage3_qualitative, stage4_risk,
    stage5_comparative,
    stage6_synthesis::{self, SynthesisInputs},
    stage7_visualize,
    types::{
        AnalysisContext, AnalysisOutcome, InvestmentType, Stage, StagePayload, StageResult,
        TOTAL_STAGES,
    },
};
use crate::config::{AnalyzerConfig, StageTokenLimits, TruncationBudgets};
use crate::error::PipelineFatalError;
use crate::gateway::LanguageModel;
use crate::pipeline_utils::{preview, StageRun};

/// The multi-stage analysis pipeline
///
/// Holds no per-run state; one instance can serve any number of runs,
/// sequentially or concurrently.
///
/// # Examples
///
/// ```no_run
/// use deal_analyzer::analysis::{AnalysisContext, AnalysisPipeline};
/// use deal_analyzer::config::AnalyzerConfig;
/// use deal_analyzer::gateway::AnthropicGateway;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = AnalyzerConfig::from_env()?;
/// let gateway = Arc::new(AnthropicGateway::new(&config)?);
/// let pipeline = AnalysisPipeline::from_config(gateway, &config);
///
/// let context = AnalysisContext::new("Should I buy this building?")
///     .with_transcript("[00:00 - 00:12] Twelve units at 45,000 dollars each");
/// let outcome = pipeline.run(&context, None).await;
/// println!("{}", outcome.report);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AnalysisPipeline {
    model: Arc<dyn LanguageModel>,
    budgets: TruncationBudgets,
    max_tokens: StageTokenLimits,
}

impl AnalysisPipeline {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            budgets: TruncationBudgets::default(),
            max_tokens: StageTokenLimits::default(),
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &AnalyzerConfig) -> Self {
        Self {
            model,
            budgets: config.budgets.clone(),
            max_tokens: config.max_tokens.clone(),
        }
    }

    pub fn with_budgets(mut self, budgets: TruncationBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_token_limits(mut self, max_tokens: StageTokenLimits) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run all stages over `context`
    ///
    /// Never fails: the worst case is an outcome whose `error` is set, whose
    /// report is a single error message and whose stage log holds whatever
    /// stages completed before the failure.
    pub async fn run(
        &self,
        context: &AnalysisContext,
        sink: Option<&dyn ProgressSink>,
    ) -> AnalysisOutcome {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        log_run_start!(run_id, TOTAL_STAGES);
        info!(%run_id, model = self.model.name(), "starting analysis");

        let mut log = StageLog::new(sink, self.budgets.log_preview);
        let result = AssertUnwindSafe(self.run_stages(context, &mut log))
            .catch_unwind()
            .await;

        let elapsed_seconds = started.elapsed().as_secs_f64();
        let failure = match result {
            Ok(Ok(report)) => {
                log_run_complete!(run_id, elapsed_seconds);
                info!(%run_id, elapsed_seconds, "analysis complete");
                return AnalysisOutcome {
                    report,
                    elapsed_seconds,
                    investment_type: log.investment_type,
                    stage_log: log.entries,
                    error: None,
                };
            }
            Ok(Err(fatal)) => fatal,
            Err(panic) => PipelineFatalError::Panicked(panic_message(panic.as_ref())),
        };

        error!(%run_id, error = %failure, stages = log.entries.len(), "analysis aborted");
        log_run_failed!(run_id, failure);

        AnalysisOutcome {
            report: failure_report(&failure.to_string()),
            elapsed_seconds,
            investment_type: log.investment_type,
            stage_log: log.entries,
            error: Some(failure.to_string()),
        }
    }

    /// Run on a separate task, streaming progress through a bounded channel
    ///
    /// The channel always holds at least one slot per stage, so a consumer
    /// that only drains after the run still sees every event up to 100%.
    pub fn spawn(
        &self,
        context: AnalysisContext,
        capacity: usize,
    ) -> (JoinHandle<AnalysisOutcome>, ProgressReceiver) {
        let (sink, rx) = progress_channel(capacity.max(TOTAL_STAGES));
        let pipeline = self.clone();

        let handle = tokio::spawn(async move {
            let sink: &dyn ProgressSink = &sink;
            pipeline.run(&context, Some(sink)).await
        });

        (handle, rx)
    }

    async fn run_stages(
        &self,
        context: &AnalysisContext,
        log: &mut StageLog<'_>,
    ) -> Result<String, PipelineFatalError> {
        let model = self.model.as_ref();
        let budgets = &self.budgets;
        let limits = &self.max_tokens;

        let classification =
            stage0_classify::classify(model, context, budgets, limits.classification).await;
        log.investment_type = Some(classification.output.investment_type);
        log.record_structured(Stage::Classification, &classification)?;

        let investment_type = classification.output.investment_type;
        let family = TemplateFamily::from(investment_type);

        let extraction =
            stage1_extract::extract(model, context, family, limits.extraction).await;
        log.record_structured(Stage::Extraction, &extraction)?;
        let extracted = &extraction.output;

        let quantitative =
            stage2_quantitative::analyze(model, extracted, family, limits.quantitative).await;
        log.record_text(Stage::Quantitative, &quantitative);

        let qualitative = stage3_qualitative::analyze(
            model,
            context,
            extracted,
            family,
            budgets,
            limits.qualitative,
        )
        .await;
        log.record_text(Stage::Qualitative, &qualitative);

        let risk = stage4_risk::analyze(
            model,
            &quantitative.output,
            &qualitative.output,
            investment_type,
            budgets,
            limits.risk,
        )
        .await;
        log.record_text(Stage::Risk, &risk);

        let comparative = stage5_comparative::analyze(
            model,
            extracted,
            investment_type,
            budgets,
            limits.comparative,
        )
        .await;
        log.record_text(Stage::Comparative, &comparative);

        let synthesis = stage6_synthesis::synthesize(
            model,
            SynthesisInputs {
                user_query: &context.user_query,
                investment_type,
                extracted,
                quantitative: &quantitative.output,
                qualitative: &qualitative.output,
                risk: &risk.output,
                comparative: &comparative.output,
            },
            budgets,
            limits.synthesis,
        )
        .await;
        log.record_text(Stage::Synthesis, &synthesis);

        let visualization = stage7_visualize::visualize(
            model,
            &quantitative.output,
            &risk.output,
            &synthesis.output,
            budgets,
            limits.visualization,
        )
        .await;
        log.record_structured(Stage::Visualization, &visualization)?;

        let report = assemble_final_report(&ReportSections {
            classification: &classification.output,
            extracted,
            quantitative: &quantitative.output,
            qualitative: &qualitative.output,
            risk: &risk.output,
            comparative: &comparative.output,
            synthesis: &synthesis.output,
            visualization: &visualization.output,
        })?;

        Ok(report)
    }
}

/// Append-only stage log for one run, plus the progress hook
struct StageLog<'a> {
    entries: Vec<StageResult>,
    investment_type: Option<InvestmentType>,
    sink: Option<&'a dyn ProgressSink>,
    preview_chars: usize,
}

impl<'a> StageLog<'a> {
    fn new(sink: Option<&'a dyn ProgressSink>, preview_chars: usize) -> Self {
        Self {
            entries: Vec::with_capacity(TOTAL_STAGES),
            investment_type: None,
            sink,
            preview_chars,
        }
    }

    fn record_text(&mut self, stage: Stage, run: &StageRun<String>) {
        let payload = StagePayload::Text(preview(&run.output, self.preview_chars));
        self.push(stage, run.status, run.note.clone(), payload);
    }

    fn record_structured<T: Serialize>(
        &mut self,
        stage: Stage,
        run: &StageRun<T>,
    ) -> Result<(), PipelineFatalError> {
        let payload = StagePayload::Structured(serde_json::to_value(&run.output)?);
        self.push(stage, run.status, run.note.clone(), payload);
        Ok(())
    }

    fn push(
        &mut self,
        stage: Stage,
        status: StageStatus,
        note: Option<String>,
        payload: StagePayload,
    ) {
        match status {
            StageStatus::Degraded => {
                log_stage_degraded!(
                    stage.index(),
                    stage.name(),
                    note.as_deref().unwrap_or("degraded")
                );
            }
            StageStatus::Completed => {
                log_stage_complete!(stage.index(), stage.name());
            }
        }

        self.entries.push(StageResult {
            stage_index: stage.index(),
            name: stage.name().to_string(),
            status,
            payload,
            note,
        });

        if let Some(sink) = self.sink {
            sink.notify(&ProgressEvent::new(
                stage.index(),
                TOTAL_STAGES,
                stage.name(),
                status,
            ));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
