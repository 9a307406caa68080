//! Stage 0: Classification
//!
//! Decides the investment type, sector, maturity and geography. Every later
//! stage picks its templates from the type decided here.

use crate::analysis::types::{AnalysisContext, Classification, Stage};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_structured_stage, truncate_chars, StageRun};
use tracing::info;

/// Images sent with the classification request
pub const CLASSIFICATION_IMAGES: usize = 5;

pub fn build_request(
    context: &AnalysisContext,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let mut prompt = String::from(
        r#"You are an expert in classifying investment opportunities.

Analyse the material provided and determine the EXACT type of investment presented.

POSSIBLE TYPES:
1. real_estate - purchase or development of property (residential, commercial, land)
2. business_acquisition - purchase of an existing business
3. startup - investment in a startup or young company
4. public_equity - listed shares
5. bonds - bonds or other debt
6. private_equity - private equity fund, LBO
7. portfolio - diversified portfolio or fund
8. other - anything else

ALSO DETERMINE:
- Main sector
- Maturity (early_stage, growth, mature, decline)
- Geography (city or region if mentioned)
- Approximate size of the investment

ANSWER WITH A JSON BLOCK:
```json
{
  "type": "real_estate|business_acquisition|startup|...",
  "sector": "sector description",
  "maturity": "early_stage|growth|mature|decline",
  "geography": "city, region or country",
  "estimated_size": number_or_null,
  "confidence": 0.0-1.0,
  "rationale": "why this type?"
}
```
"#,
    );

    if !context.user_query.trim().is_empty() {
        prompt.push_str(&format!("\n\nINVESTOR QUESTION:\n{}", context.user_query));
    }
    if let Some(transcript) = context.transcript() {
        prompt.push_str(&format!(
            "\n\nTRANSCRIPT:\n{}",
            truncate_chars(transcript, budgets.classify_transcript)
        ));
    }
    if let Some(text) = context.recognized_text() {
        prompt.push_str(&format!(
            "\n\nEXTRACTED TEXT:\n{}",
            truncate_chars(text, budgets.classify_recognized_text)
        ));
    }

    GenerationRequest::new(prompt, max_tokens)
        .with_images(context.leading_images(CLASSIFICATION_IMAGES))
}

pub async fn classify(
    model: &dyn LanguageModel,
    context: &AnalysisContext,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<Classification> {
    let request = build_request(context, budgets, max_tokens);
    let mut run = run_structured_stage(
        model,
        Stage::Classification.context(),
        request,
        Classification::default(),
    )
    .await;
    run.output = run.output.normalized();

    info!(
        investment_type = %run.output.investment_type,
        confidence = run.output.confidence,
        sector = run.output.sector.as_deref().unwrap_or("n/a"),
        "classification decided"
    );
    run
}
