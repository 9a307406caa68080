//! Tests for configuration flowing into the pipeline

use super::common::*;
use deal_analyzer::analysis::AnalysisPipeline;
use deal_analyzer::config::{AnalyzerConfig, StageTokenLimits, TruncationBudgets};
use deal_analyzer::gateway::AnthropicGateway;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_gateway_requires_api_key() {
    assert!(AnthropicGateway::new(&AnalyzerConfig::default()).is_err());

    let config = AnalyzerConfig::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();
    assert!(AnthropicGateway::new(&config).is_ok());
}

#[test]
fn test_media_overrides() {
    let config = AnalyzerConfig::from_lookup(lookup(&[
        ("ANTHROPIC_API_KEY", "sk-test"),
        ("DEAL_ANALYZER_FRAME_FPS", "1"),
        ("DEAL_ANALYZER_MAX_FRAMES", "8"),
        ("WHISPER_MODEL", "small"),
    ]))
    .unwrap();

    assert_eq!(config.media.frame_fps, 1);
    assert_eq!(config.media.max_frames, 8);
    assert_eq!(config.media.whisper_model, "small");
}

#[tokio::test]
async fn test_token_limits_reach_each_stage() {
    let config = AnalyzerConfig {
        max_tokens: StageTokenLimits {
            classification: 10,
            extraction: 11,
            quantitative: 12,
            qualitative: 13,
            risk: 14,
            comparative: 15,
            synthesis: 16,
            visualization: 17,
            chat: 18,
        },
        ..Default::default()
    };
    let model = ScriptedModel::new(real_estate_script());
    AnalysisPipeline::from_config(model.clone(), &config)
        .run(&real_estate_context(), None)
        .await;

    let limits: Vec<u32> = model.requests().iter().map(|r| r.max_tokens).collect();
    assert_eq!(limits, vec![10, 11, 12, 13, 14, 15, 16, 17]);
}

#[tokio::test]
async fn test_budgets_bound_embedded_outputs() {
    let mut script = real_estate_script();
    script[2] = Reply::Text(format!("{}QUANT_TAIL", "q".repeat(300)));
    let model = ScriptedModel::new(script);

    let budgets = TruncationBudgets {
        risk_quantitative: 300,
        synthesis_quantitative: 300,
        visualization_quantitative: 300,
        ..Default::default()
    };
    pipeline(&model)
        .with_budgets(budgets)
        .run(&real_estate_context(), None)
        .await;

    let requests = model.requests();
    for stage in [4, 6, 7] {
        assert!(
            !requests[stage].prompt.contains("QUANT_TAIL"),
            "stage {} saw untruncated quantitative output",
            stage
        );
    }
}
