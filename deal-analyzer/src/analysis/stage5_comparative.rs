//! Stage 5: Comparative evaluation and benchmarking

use crate::analysis::types::{ExtractedData, InvestmentType, Stage};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_text_stage, StageRun};

pub fn build_request(
    extracted: &ExtractedData,
    investment_type: InvestmentType,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let prompt = format!(
        r#"You are an expert in comparative valuation.

TYPE: {investment_type}

DATA:
{data}

MISSION: compare with similar deals and assets.

REQUIRED ANALYSES:
1. MARKET COMPARABLES: 3-5 recent similar transactions, their multiples, why this one is cheaper or dearer
2. SECTOR BENCHMARKS: sector averages, relative position, historical trends
3. REFERENCE DEALS: known similar cases, lessons learned, successes and failures
4. ASSUMPTION CHECK: our assumptions against the market, realism of projections

FORMAT:
Comparison table, gap analysis and validation
"#,
        investment_type = investment_type,
        data = extracted.condensed(budgets.comparative_extraction),
    );

    GenerationRequest::new(prompt, max_tokens)
}

pub async fn analyze(
    model: &dyn LanguageModel,
    extracted: &ExtractedData,
    investment_type: InvestmentType,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<String> {
    let request = build_request(extracted, investment_type, budgets, max_tokens);
    run_text_stage(model, Stage::Comparative.context(), request).await
}
