//! Stage 1: Data extraction
//!
//! Facts and figures only, each tied to where it was found. The result is
//! checked against the family's required keys before anything downstream
//! sees it.

use crate::analysis::prompts::{clock, TemplateFamily};
use crate::analysis::types::{AnalysisContext, ExtractedData, Stage};
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_structured_stage, StageRun};
use tracing::{info, warn};

pub fn build_request(
    context: &AnalysisContext,
    family: TemplateFamily,
    max_tokens: u32,
) -> GenerationRequest {
    let required = family.required_fields().join(", ");

    let mut prompt = format!(
        r#"You are a financial analyst specialised in data extraction.

EXTRACT FACTS AND FIGURES ONLY (no analysis):

{focus}

For EACH value give:
1. The exact value
2. Its precise source (audio at mm:ss, frame #N, or document)
3. Your confidence between 0 and 1

Use these keys when the value exists: {required}
If a value is MISSING, list its key in "missing_fields".
If sources DISAGREE, describe it in "inconsistencies" (e.g. "audio says X but the slide shows Y").
Never report a value without a source.

JSON FORMAT:
```json
{{
  "fields": {{
    "key": {{"value": value, "source": "source description", "confidence": 0.0-1.0}}
  }},
  "missing_fields": ["key"],
  "inconsistencies": ["description"]
}}
```
"#,
        focus = family.extraction_focus(),
        required = required,
    );

    let timestamps = context.frame_timestamps();
    if !timestamps.is_empty() {
        prompt.push_str("\n\nFRAMES (attached in this order):\n");
        for (i, seconds) in timestamps {
            prompt.push_str(&format!("- frame #{} at {}\n", i + 1, clock(seconds)));
        }
    }
    if let Some(transcript) = context.transcript() {
        prompt.push_str(&format!("\n\nFULL TRANSCRIPT:\n{}", transcript));
    }
    if let Some(text) = context.recognized_text() {
        prompt.push_str(&format!("\n\nEXTRACTED TEXT:\n{}", text));
    }

    GenerationRequest::new(prompt, max_tokens).with_images(context.all_images())
}

pub async fn extract(
    model: &dyn LanguageModel,
    context: &AnalysisContext,
    family: TemplateFamily,
    max_tokens: u32,
) -> StageRun<ExtractedData> {
    let request = build_request(context, family, max_tokens);
    let mut run = run_structured_stage(
        model,
        Stage::Extraction.context(),
        request,
        ExtractedData::default(),
    )
    .await;
    run.output = run.output.enforce(family.required_fields());

    info!(fields = run.output.fields.len(), "data extracted");
    if !run.output.missing_fields.is_empty() {
        warn!(
            missing = run.output.missing_fields.len(),
            "extraction reported missing data"
        );
    }
    if !run.output.inconsistencies.is_empty() {
        warn!(
            inconsistencies = run.output.inconsistencies.len(),
            "extraction found inconsistencies"
        );
    }
    run
}
