//! Stage 6: Synthesis and decision
//!
//! Integrates every prior output into one recommendation. The text is expected
//! to carry a `BUY`, `NEGOTIATE` or `PASS` marker; a missing marker is a
//! quality warning, not a failure.

use crate::analysis::types::{Decision, ExtractedData, InvestmentType, Stage};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_text_stage, truncate_chars, StageRun};
use tracing::{info, warn};

/// Everything the synthesis reads
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInputs<'a> {
    pub user_query: &'a str,
    pub investment_type: InvestmentType,
    pub extracted: &'a ExtractedData,
    pub quantitative: &'a str,
    pub qualitative: &'a str,
    pub risk: &'a str,
    pub comparative: &'a str,
}

pub fn build_request(
    inputs: SynthesisInputs<'_>,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let question = if inputs.user_query.trim().is_empty() {
        "Should I make this investment?"
    } else {
        inputs.user_query
    };

    let prompt = format!(
        r#"You are a value investor with fifty years of experience.

You have a COMPLETE five-part analysis in front of you.

TYPE: {investment_type}
INVESTOR QUESTION: {question}

=== PART 1: EXTRACTED DATA ===
{extracted}

=== PART 2: QUANTITATIVE ANALYSIS ===
{quantitative}

=== PART 3: QUALITATIVE ANALYSIS ===
{qualitative}

=== PART 4: RISK ANALYSIS ===
{risk}

=== PART 5: COMPARATIVE EVALUATION ===
{comparative}

MISSION: FINAL SYNTHESIS AND DECISION

MANDATORY STRUCTURE:
1. EXECUTIVE SUMMARY: the opportunity in one sentence, top 3 strengths, top 3 weaknesses
2. INTRINSIC VALUE: pessimistic, realistic and optimistic values, asking price,
   margin of safety = (realistic - asking) / asking x 100
3. DURABLE STRENGTHS: moat, management or asset quality, positioning (each scored /10)
4. CRITICAL RISKS: top 3 with $ impact, mitigation, blocking risks
5. FINAL DECISION, written exactly as one of:
   **BUY** / **NEGOTIATE AT [price]** / **PASS**
   - BUY: maximum acceptable price, non-negotiable conditions, expected payback
   - NEGOTIATE: target price with a 30% margin, top 3 arguments, walk-away price
   - PASS: quantified reasons, what would have to change to reconsider
6. RED FLAGS: each rated blocking, negotiable or minor

RULES:
- Integrate ALL previous analyses
- A clear-cut decision, no "maybe"
- Protect the investor: when in doubt, PASS
"#,
        investment_type = inputs.investment_type,
        question = question,
        extracted = inputs.extracted.condensed(budgets.synthesis_extraction),
        quantitative = truncate_chars(inputs.quantitative, budgets.synthesis_quantitative),
        qualitative = truncate_chars(inputs.qualitative, budgets.synthesis_qualitative),
        risk = truncate_chars(inputs.risk, budgets.synthesis_risk),
        comparative = truncate_chars(inputs.comparative, budgets.synthesis_comparative),
    );

    GenerationRequest::new(prompt, max_tokens)
}

pub async fn synthesize(
    model: &dyn LanguageModel,
    inputs: SynthesisInputs<'_>,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<String> {
    let request = build_request(inputs, budgets, max_tokens);
    let run = run_text_stage(model, Stage::Synthesis.context(), request).await;
    if run.is_degraded() {
        return run;
    }

    match Decision::detect(&run.output) {
        Some(decision) => {
            info!(%decision, "decision reached");
            run
        }
        None => {
            warn!("synthesis carries no BUY/NEGOTIATE/PASS marker");
            run.degrade("no decision marker in synthesis")
        }
    }
}
