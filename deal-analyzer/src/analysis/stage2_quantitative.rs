//! Stage 2: Quantitative due diligence
//!
//! Pure calculation over the extracted data: valuation, returns, scenarios.

use crate::analysis::prompts::TemplateFamily;
use crate::analysis::types::{ExtractedData, Stage};
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_text_stage, StageRun};

pub fn build_request(
    extracted: &ExtractedData,
    family: TemplateFamily,
    max_tokens: u32,
) -> GenerationRequest {
    let prompt = format!(
        r#"You are a CFA-level quantitative analyst.

{focus}

EXTRACTED DATA:
{data}

RULES:
- SHOW EVERY FORMULA: `Name = (detailed formula) = result`
- Show each calculation step
- Justify each assumption
- When a value is missing, say so and use a conservative assumption
- Year-by-year tables
- Clear number formatting

FORMAT:
Free text with explicit formulas, a cash flow table and compared scenarios
"#,
        focus = family.quantitative_focus(),
        data = extracted.to_pretty_json(),
    );

    GenerationRequest::new(prompt, max_tokens)
}

pub async fn analyze(
    model: &dyn LanguageModel,
    extracted: &ExtractedData,
    family: TemplateFamily,
    max_tokens: u32,
) -> StageRun<String> {
    let request = build_request(extracted, family, max_tokens);
    run_text_stage(model, Stage::Quantitative.context(), request).await
}
