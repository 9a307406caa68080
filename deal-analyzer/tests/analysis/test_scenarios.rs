//! End-to-end scenarios

use super::common::*;
use deal_analyzer::analysis::{
    AnalysisContext, Decision, ExtractedData, InvestmentType, StagePayload, TemplateFamily,
    VisualizationData, TOTAL_STAGES,
};
use deal_analyzer::pipeline_utils::decode_fenced;

#[tokio::test]
async fn test_real_estate_walkthrough() {
    let model = ScriptedModel::new(real_estate_script());
    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.investment_type, Some(InvestmentType::RealEstate));
    assert!(outcome.report.contains("INVESTMENT TYPE: REAL_ESTATE"));
    assert!(outcome.report.contains("Geography: Quebec City"));
    assert!(outcome.report.contains("**NEGOTIATE AT $480,000**"));

    // stage 1 keeps sourced values and reports the rest as missing
    let extracted: ExtractedData = match &outcome.stage_log[1].payload {
        StagePayload::Structured(value) => serde_json::from_value(value.clone()).unwrap(),
        other => panic!("unexpected payload {:?}", other),
    };
    assert_eq!(extracted.fields["unit_count"].value, 12);
    assert_eq!(extracted.fields["price_per_unit"].value, 45000);
    assert_eq!(extracted.fields["price_per_unit"].source, "audio 00:12");
    assert!(extracted.missing_fields.contains(&"occupancy_rate".to_string()));
    assert!(extracted.missing_fields.contains(&"property_taxes".to_string()));
    assert!(extracted.missing_fields.contains(&"location".to_string()));

    // the real-estate templates were used downstream
    let extraction_prompt = model.request(1).prompt;
    assert!(extraction_prompt.contains("price_per_unit"));
    assert!(extraction_prompt.contains("frame #3 at 00:01"));
    let quantitative_prompt = model.request(2).prompt;
    assert!(quantitative_prompt.contains("\"unit_count\""));
    assert!(quantitative_prompt.contains("45000"));

    // chart data survives into the report
    let viz: VisualizationData = decode_fenced(&outcome.report).unwrap();
    assert_eq!(viz.summary.decision, Decision::Negotiate);
    assert_eq!(viz.summary.investment, 540_000.0);
    assert_eq!(viz.summary.margin_of_safety_pct, 11.0);
    assert_eq!(viz.cashflow_projection[0].revenue, 316_800.0);
    assert_eq!(viz.risks[0].name, "Vacancy");
}

#[tokio::test]
async fn test_query_only_reports_missing_data() {
    // a model with nothing to go on declines to fill the structured blocks
    let model = ScriptedModel::new(vec![
        text("I cannot classify this without material."),
        text("No data available."),
        text("No figures to analyse."),
        text("No qualitative context."),
        text("Risks cannot be quantified."),
        text("No comparables."),
        text("Not enough information to proceed. **PASS**"),
        text("No chart data."),
    ]);
    let context = AnalysisContext::new("Is this a good investment?");

    let outcome = pipeline(&model).run(&context, None).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.stage_log.len(), TOTAL_STAGES);
    assert_eq!(outcome.investment_type, Some(InvestmentType::Other));

    let extracted: ExtractedData = match &outcome.stage_log[1].payload {
        StagePayload::Structured(value) => serde_json::from_value(value.clone()).unwrap(),
        other => panic!("unexpected payload {:?}", other),
    };
    assert!(extracted.fields.is_empty());
    assert_eq!(
        extracted.missing_fields.len(),
        TemplateFamily::Generic.required_fields().len()
    );

    assert!(model.requests().iter().all(|r| r.images.is_empty()));
    assert!(outcome.report.contains("**PASS**"));
    assert_eq!(outcome.degraded_stages(), vec![0, 1, 7]);
}

#[tokio::test]
async fn test_synthesis_without_marker_is_degraded_but_kept() {
    let mut script = real_estate_script();
    script[6] = text("The building looks interesting overall.");
    let model = ScriptedModel::new(script);

    let outcome = pipeline(&model).run(&real_estate_context(), None).await;

    assert_eq!(outcome.degraded_stages(), vec![6]);
    assert_eq!(
        outcome.stage_log[6].note.as_deref(),
        Some("no decision marker in synthesis")
    );
    assert!(outcome
        .report
        .contains("The building looks interesting overall."));
}

#[tokio::test]
async fn test_still_image_analysis() {
    let model = ScriptedModel::new(real_estate_script());
    let context = AnalysisContext::new("Good deal?")
        .with_recognized_text("12 units - $540,000")
        .with_still_image(image("listing"));

    let outcome = pipeline(&model).run(&context, None).await;

    assert_eq!(outcome.stage_log.len(), TOTAL_STAGES);
    let requests = model.requests();
    assert_eq!(requests[0].images.len(), 1);
    assert_eq!(requests[1].images.len(), 1);
    assert_eq!(requests[3].images.len(), 1);
    assert!(requests[0].prompt.contains("12 units - $540,000"));
}
