//! Stage 7: Visualization data
//!
//! Pulls the chart numbers out of the earlier analyses into the fixed
//! [`VisualizationData`] schema.

use crate::analysis::types::{Stage, VisualizationData};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_structured_stage, truncate_chars, StageRun};

pub fn build_request(
    quantitative: &str,
    risk: &str,
    synthesis: &str,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let prompt = format!(
        r#"You are a data engineer.

MISSION: extract the numbers and produce JSON for the charts.

QUANTITATIVE ANALYSIS:
{quantitative}

RISK ANALYSIS:
{risk}

SYNTHESIS:
{synthesis}

PRODUCE EXACTLY THIS JSON:

```json
{{
  "summary": {{
    "investment": <amount invested>,
    "intrinsic_value": <realistic value>,
    "asking_price": <asking price>,
    "margin_of_safety_pct": <(value - price) / price x 100>,
    "annual_roi_pct": <annualised ROI>,
    "cap_rate_pct": <cap rate if applicable, else 0>,
    "decision": "BUY|NEGOTIATE|PASS"
  }},
  "cashflow_projection": [
    {{"year": 1, "revenue": 0, "expenses": 0, "net_cash_flow": 0}}
  ],
  "value_scenarios": {{
    "pessimistic": <worst case value>,
    "realistic": <base case value>,
    "optimistic": <best case value>
  }},
  "risks": [
    {{"name": "Risk X", "financial_impact": 0, "probability_pct": 0}}
  ],
  "roi_timeline": [
    {{"year": 1, "portfolio_value": 0, "cumulative_cash_flow": 0, "roi_pct": 0}}
  ]
}}
```

RULES:
- Numbers ONLY, never strings
- When a value is missing use 0 or a reasonable estimate
- Stay consistent with the previous analyses
- Complete arrays: 10-20 years for projections, top 3 risks, no "..."
"#,
        quantitative = truncate_chars(quantitative, budgets.visualization_quantitative),
        risk = truncate_chars(risk, budgets.visualization_risk),
        synthesis = truncate_chars(synthesis, budgets.visualization_synthesis),
    );

    GenerationRequest::new(prompt, max_tokens)
}

pub async fn visualize(
    model: &dyn LanguageModel,
    quantitative: &str,
    risk: &str,
    synthesis: &str,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<VisualizationData> {
    let request = build_request(quantitative, risk, synthesis, budgets, max_tokens);
    run_structured_stage(
        model,
        Stage::Visualization.context(),
        request,
        VisualizationData::default(),
    )
    .await
}
