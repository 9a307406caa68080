//! Tests for stage output types and structured decoding

use deal_analyzer::analysis::{
    Classification, Decision, ExtractedData, InvestmentType, Maturity, TemplateFamily,
    VisualizationData,
};
use deal_analyzer::pipeline_utils::parse_structured_payload;

#[test]
fn test_classification_accepts_legacy_keys() {
    let json = r#"{
        "type": "immobilier",
        "secteur": "Residential",
        "maturite": "mature",
        "geographie": "Montreal",
        "taille_investissement_estimee": "1.2M",
        "confiance": "85%"
    }"#;

    let classification: Classification = serde_json::from_str(json).unwrap();
    assert_eq!(classification.investment_type, InvestmentType::RealEstate);
    assert_eq!(classification.sector.as_deref(), Some("Residential"));
    assert_eq!(classification.maturity, Some(Maturity::Mature));
    assert_eq!(classification.estimated_size, Some(1_200_000.0));
}

#[test]
fn test_unknown_type_is_other() {
    let classification: Classification =
        serde_json::from_str(r#"{"type": "crypto", "confidence": 0.4}"#).unwrap();
    assert_eq!(classification.investment_type, InvestmentType::Other);
    assert_eq!(
        TemplateFamily::from(classification.investment_type),
        TemplateFamily::Generic
    );
}

#[test]
fn test_confidence_clamped() {
    let classification = Classification {
        confidence: 7.0,
        ..Default::default()
    }
    .normalized();
    assert_eq!(classification.confidence, 1.0);
}

#[test]
fn test_parser_returns_exact_default_on_garbage() {
    let default = Classification {
        rationale: Some("sentinel".to_string()),
        ..Default::default()
    };

    for response in [
        "no block at all",
        "```json\n{\"type\": ",
        "```json\nnot json\n```",
        "",
    ] {
        let decoded = parse_structured_payload(response, default.clone());
        assert!(decoded.used_default(), "response {:?}", response);
        assert_eq!(decoded.into_value(), default);
    }
}

#[test]
fn test_parser_takes_first_json_block() {
    let response = "```json\n{\"type\": \"startup\"}\n```\nthen\n```json\n{\"type\": \"bonds\"}\n```";
    let decoded = parse_structured_payload(response, Classification::default());
    assert!(!decoded.used_default());
    assert_eq!(decoded.into_value().investment_type, InvestmentType::Startup);
}

#[test]
fn test_enforce_traceability() {
    let json = r#"{
        "fields": {
            "ebitda": {"value": 250000, "source": "slide 3", "confidence": 0.9},
            "asking_price": {"value": 1000000, "source": "", "confidence": 0.5},
            "employee_count": {"value": null, "source": "", "confidence": 0}
        }
    }"#;
    let data: ExtractedData = serde_json::from_str(json).unwrap();
    let data = data.enforce(TemplateFamily::BusinessAcquisition.required_fields());

    assert!(data.fields.contains_key("ebitda"));
    assert!(!data.fields.contains_key("asking_price"));
    assert!(data
        .inconsistencies
        .iter()
        .any(|issue| issue.starts_with("asking_price")));
    assert!(data.missing_fields.contains(&"employee_count".to_string()));
    assert!(data.missing_fields.contains(&"annual_revenue".to_string()));
    // every required key is accounted for
    for key in TemplateFamily::BusinessAcquisition.required_fields() {
        assert!(
            data.fields.contains_key(*key) || data.missing_fields.iter().any(|m| m == key),
            "{} unaccounted for",
            key
        );
    }
}

#[test]
fn test_condensed_extraction_stays_valid_json() {
    let mut json = String::from("{\"fields\": {");
    for i in 0..40 {
        if i > 0 {
            json.push(',');
        }
        json.push_str(&format!(
            "\"field_{i}\": {{\"value\": \"a fairly long value number {i}\", \"source\": \"audio 00:{i:02}\", \"confidence\": 0.9}}"
        ));
    }
    json.push_str("}}");
    let data: ExtractedData = serde_json::from_str(&json).unwrap();

    let condensed = data.condensed(500);
    assert!(condensed.chars().count() <= 500);
    let reparsed: ExtractedData = serde_json::from_str(&condensed).unwrap();
    assert!(!reparsed.fields.is_empty());
    assert!(reparsed.fields.len() < data.fields.len());
}

#[test]
fn test_decision_markers() {
    assert_eq!(Decision::detect("**BUY** at asking"), Some(Decision::Buy));
    assert_eq!(
        Decision::detect("**NEGOTIATE AT $480,000**"),
        Some(Decision::Negotiate)
    );
    assert_eq!(Decision::detect("Verdict: **PASS**"), Some(Decision::Pass));
    assert_eq!(Decision::detect("**NÉGOCIER À 400 000$**"), Some(Decision::Negotiate));
    assert_eq!(Decision::detect("Final answer: PASS."), Some(Decision::Pass));
    assert_eq!(Decision::detect("It depends on the financing."), None);
}

#[test]
fn test_visualization_lenient_numbers() {
    let json = r#"{
        "summary": {"investment": "$1.5M", "cap_rate_pct": "7.5%", "decision": "PASS"},
        "cashflow_projection": "not a list",
        "risques": [{"nom": "Rates", "impact_financier": "50k", "probabilite_pct": 30}]
    }"#;
    let viz: VisualizationData = serde_json::from_str(json).unwrap();

    assert_eq!(viz.summary.investment, 1_500_000.0);
    assert_eq!(viz.summary.cap_rate_pct, 7.5);
    assert_eq!(viz.summary.decision, Decision::Pass);
    assert!(viz.cashflow_projection.is_empty());
    assert_eq!(viz.risks[0].name, "Rates");
    assert_eq!(viz.risks[0].financial_impact, 50_000.0);
}

#[test]
fn test_visualization_default_is_incomplete() {
    let viz = VisualizationData::default();
    assert_eq!(viz.summary.decision, Decision::Incomplete);
    assert_eq!(viz.summary.investment, 0.0);
}
