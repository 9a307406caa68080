//! Stage 4: Risk analysis

use crate::analysis::types::{InvestmentType, Stage};
use crate::config::TruncationBudgets;
use crate::gateway::{GenerationRequest, LanguageModel};
use crate::pipeline_utils::{run_text_stage, truncate_chars, StageRun};

pub fn build_request(
    quantitative: &str,
    qualitative: &str,
    investment_type: InvestmentType,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> GenerationRequest {
    let prompt = format!(
        r#"You are a Chief Risk Officer reviewing this opportunity.

INVESTMENT TYPE: {investment_type}

PREVIOUS ANALYSES:
--- QUANTITATIVE ---
{quantitative}

--- QUALITATIVE ---
{qualitative}

MISSION: identify ALL risks and QUANTIFY them.

RISK CATEGORIES:
1. MARKET: economic cycles, interest rates, inflation, currency
2. OPERATIONAL: execution, management, systems, fraud
3. STRATEGIC: competition, technological disruption, regulation, obsolescence
4. FINANCIAL: liquidity, solvency, capital structure, covenants
5. SPECIFIC to this investment type

FOR EACH RISK:
- Precise description
- Financial impact: $X (adverse scenario)
- Probability: Y%
- Expected loss: impact x probability
- Possible mitigation and its cost
- Correlation with other risks

STRESS SCENARIOS:
- Recession (-20% revenue)
- Interest rates +300 bps
- Loss of a major customer
- Aggressive competitor

FORMAT:
Full risk table, stress tests and an overall value at risk
"#,
        investment_type = investment_type,
        quantitative = truncate_chars(quantitative, budgets.risk_quantitative),
        qualitative = truncate_chars(qualitative, budgets.risk_qualitative),
    );

    GenerationRequest::new(prompt, max_tokens)
}

pub async fn analyze(
    model: &dyn LanguageModel,
    quantitative: &str,
    qualitative: &str,
    investment_type: InvestmentType,
    budgets: &TruncationBudgets,
    max_tokens: u32,
) -> StageRun<String> {
    let request = build_request(quantitative, qualitative, investment_type, budgets, max_tokens);
    run_text_stage(model, Stage::Risk.context(), request).await
}
