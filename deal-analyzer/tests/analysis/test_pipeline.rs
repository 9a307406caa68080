//! Tests for pipeline orchestration

use super::common::*;
use deal_analyzer::analysis::{AnalysisContext, InvestmentType, StagePayload, TOTAL_STAGES};
use deal_analyzer_sdk::{ProgressEvent, ProgressSink, StageStatus};
use std::sync::Mutex;

fn assert_complete_log(indices: &[usize]) {
    assert_eq!(indices, (0..TOTAL_STAGES).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stage_log_has_every_stage_in_order() {
    let model = ScriptedModel::new(real_estate_script());
    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    let indices: Vec<usize> = outcome.stage_log.iter().map(|r| r.stage_index).collect();
    assert_complete_log(&indices);
    assert!(outcome.error.is_none());
    assert!(outcome.degraded_stages().is_empty());
    assert_eq!(model.requests().len(), TOTAL_STAGES);
    assert_eq!(outcome.stage_log[6].name, "Synthesis & Decision");
}

#[tokio::test]
async fn test_stage_log_complete_when_every_call_fails() {
    let model = ScriptedModel::new(vec![]);
    let outcome = pipeline(&model).run(&AnalysisContext::new("q"), None).await;

    let indices: Vec<usize> = outcome.stage_log.iter().map(|r| r.stage_index).collect();
    assert_complete_log(&indices);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.degraded_stages(), indices);
    assert_eq!(outcome.investment_type, Some(InvestmentType::Other));
}

#[tokio::test]
async fn test_progress_strictly_increasing_to_100() {
    let events = Mutex::new(Vec::<ProgressEvent>::new());
    let record = |event: &ProgressEvent| events.lock().unwrap().push(event.clone());
    let sink: &dyn ProgressSink = &record;

    let model = ScriptedModel::new(real_estate_script());
    pipeline(&model)
        .run(&real_estate_context(), Some(sink))
        .await;

    let events = events.lock().unwrap().clone();
    assert_eq!(events.len(), TOTAL_STAGES);
    assert!(events
        .windows(2)
        .all(|w| w[0].progress_percent < w[1].progress_percent));
    assert_eq!(events.last().unwrap().progress_percent, 100.0);
    assert!(events.last().unwrap().is_final());
}

#[tokio::test]
async fn test_spawn_streams_progress() {
    let model = ScriptedModel::new(real_estate_script());
    let (handle, mut rx) = pipeline(&model).spawn(real_estate_context(), 16);

    let mut seen = Vec::new();
    while let Some(event) = rx.recv().await {
        seen.push(event.stage_index);
    }
    let outcome = handle.await.unwrap();

    assert_complete_log(&seen);
    assert_eq!(outcome.investment_type, Some(InvestmentType::RealEstate));
}

#[tokio::test]
async fn test_spawn_does_not_block_on_small_channel() {
    let model = ScriptedModel::new(real_estate_script());
    let (handle, rx) = pipeline(&model).spawn(real_estate_context(), 1);

    // nobody reads until the run is over
    let outcome = handle.await.unwrap();
    drop(rx);

    assert_eq!(outcome.stage_log.len(), TOTAL_STAGES);
}

#[tokio::test]
async fn test_late_reader_still_sees_final_progress() {
    let model = ScriptedModel::new(real_estate_script());
    let (handle, mut rx) = pipeline(&model).spawn(real_estate_context(), 4);

    let outcome = handle.await.unwrap();
    let mut delivered = Vec::new();
    while let Some(event) = rx.recv().await {
        delivered.push(event.progress_percent);
    }

    assert_eq!(outcome.stage_log.len(), TOTAL_STAGES);
    assert_eq!(delivered.len(), TOTAL_STAGES);
    assert_eq!(delivered.last().copied(), Some(100.0));
}

#[tokio::test]
async fn test_stage3_failure_is_contained() {
    let mut script = real_estate_script();
    script[3] = Reply::Fail;
    let model = ScriptedModel::new(script);

    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.degraded_stages(), vec![3]);
    assert!(outcome.report.contains("STAGE 6: SYNTHESIS AND FINAL DECISION"));
    assert!(outcome.report.contains("STRUCTURED DATA FOR CHARTS"));
    assert!(outcome
        .report
        .contains("Error: Qualitative Due Diligence failed"));

    // the placeholder is what later stages see
    let risk_prompt = model.request(4).prompt;
    assert!(risk_prompt.contains("Error: Qualitative Due Diligence failed"));
}

#[tokio::test]
async fn test_malformed_structured_stage_uses_default() {
    let mut script = real_estate_script();
    script[7] = text("Sorry, here are the numbers without a block.");
    let model = ScriptedModel::new(script);

    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    assert_eq!(outcome.degraded_stages(), vec![7]);
    let viz = &outcome.stage_log[7];
    assert_eq!(viz.status, StageStatus::Degraded);
    match &viz.payload {
        StagePayload::Structured(value) => {
            assert_eq!(value["summary"]["decision"], "INCOMPLETE");
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_panic_is_caught_with_partial_log() {
    let mut script = real_estate_script();
    script[4] = Reply::Panic;
    let model = ScriptedModel::new(script);

    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    assert!(outcome.is_failed());
    assert!(outcome.error.as_deref().unwrap().contains("scripted model panic"));
    assert!(outcome.report.starts_with("Analysis failed:"));
    assert_eq!(outcome.stage_log.len(), 4);
    assert_eq!(outcome.investment_type, Some(InvestmentType::RealEstate));
}

#[tokio::test]
async fn test_text_payload_is_a_bounded_preview() {
    let mut script = real_estate_script();
    script[2] = Reply::Text("x".repeat(5000));
    let model = ScriptedModel::new(script);

    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    match &outcome.stage_log[2].payload {
        StagePayload::Text(preview) => {
            assert!(preview.chars().count() < 5000);
            assert!(preview.ends_with("..."));
        }
        other => panic!("unexpected payload {:?}", other),
    }
    // the full text still reaches the report
    assert!(outcome.report.contains(&"x".repeat(5000)));
}

#[tokio::test]
async fn test_pipeline_is_reusable() {
    let model = ScriptedModel::new(
        real_estate_script()
            .into_iter()
            .chain(real_estate_script())
            .collect(),
    );
    let pipeline = pipeline(&model);

    let first = pipeline.run(&real_estate_context(), None).await;
    let second = pipeline.run(&real_estate_context(), None).await;

    assert_eq!(first.report, second.report);
    assert_eq!(first.stage_log, second.stage_log);
}
