//! Stage 3: Qualitative due diligence
//!
//! Moat, management, market and strategy. No calculations.

use crate::analysis::prompts::TemplateFamily;
use crate::analysis::types::{AnalysisContext, ExtractedData, Stage};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_text_stage, StageRun};

/// Every n-th image is attached
pub const IMAGE_SAMPLE_STEP: usize = 5;

pub fn build_request(
    context: &AnalysisContext,
    extracted: &ExtractedData,
    family: TemplateFamily,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let mut prompt = format!(
        r#"You are an expert in qualitative investment analysis.

{focus}

AVAILABLE CONTEXT:
{data}

RULES:
- NO CALCULATIONS (done in the previous stage)
- Focus entirely on what cannot be quantified
- Identify strengths AND weaknesses
- Think long term (10-20 years)
- No unjustified optimism

Free format, detailed analysis.
"#,
        focus = family.qualitative_focus(),
        data = extracted.condensed(budgets.qualitative_extraction),
    );

    if let Some(transcript) = context.transcript() {
        prompt.push_str(&format!(
            "\n\nTRANSCRIPT (qualitative context):\n{}",
            transcript
        ));
    }

    GenerationRequest::new(prompt, max_tokens)
        .with_images(context.sampled_images(IMAGE_SAMPLE_STEP))
}

pub async fn analyze(
    model: &dyn LanguageModel,
    context: &AnalysisContext,
    extracted: &ExtractedData,
    family: TemplateFamily,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<String> {
    let request = build_request(context, extracted, family, budgets, max_tokens);
    run_text_stage(model, Stage::Qualitative.context(), request).await
}
