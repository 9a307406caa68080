//! Tests for per-stage request construction

use super::common::*;
use deal_analyzer::analysis::stage0_classify::{self, CLASSIFICATION_IMAGES};
use deal_analyzer::analysis::stage3_qualitative::{self, IMAGE_SAMPLE_STEP};
use deal_analyzer::analysis::stage6_synthesis::{self, SynthesisInputs};
use deal_analyzer::analysis::{
    stage1_extract, stage2_quantitative, stage4_risk, stage5_comparative, stage7_visualize,
    AnalysisContext, ExtractedData, InvestmentType, TemplateFamily,
};
use deal_analyzer::config::TruncationBudgets;

fn empty_data(family: TemplateFamily) -> ExtractedData {
    ExtractedData::default().enforce(family.required_fields())
}

#[test]
fn test_every_stage_builds_a_prompt_for_every_type() {
    let budgets = TruncationBudgets::default();
    let context = AnalysisContext::new("");

    let classify = stage0_classify::build_request(&context, &budgets, 1024);
    assert!(!classify.prompt.trim().is_empty());

    for investment_type in InvestmentType::ALL {
        let family = TemplateFamily::from(investment_type);
        let data = empty_data(family);

        let prompts = [
            stage1_extract::build_request(&context, family, 2048).prompt,
            stage2_quantitative::build_request(&data, family, 4096).prompt,
            stage3_qualitative::build_request(&context, &data, family, &budgets, 4096).prompt,
            stage4_risk::build_request("", "", investment_type, &budgets, 4096).prompt,
            stage5_comparative::build_request(&data, investment_type, &budgets, 3072).prompt,
            stage6_synthesis::build_request(
                SynthesisInputs {
                    user_query: "",
                    investment_type,
                    extracted: &data,
                    quantitative: "",
                    qualitative: "",
                    risk: "",
                    comparative: "",
                },
                &budgets,
                4096,
            )
            .prompt,
            stage7_visualize::build_request("", "", "", &budgets, 3072).prompt,
        ];

        for (i, prompt) in prompts.iter().enumerate() {
            assert!(
                !prompt.trim().is_empty(),
                "stage {} empty for {}",
                i + 1,
                investment_type
            );
        }
    }
}

#[test]
fn test_extraction_prompt_lists_required_keys() {
    let context = AnalysisContext::new("q");
    for family in [
        TemplateFamily::RealEstate,
        TemplateFamily::BusinessAcquisition,
        TemplateFamily::Startup,
        TemplateFamily::Generic,
    ] {
        let prompt = stage1_extract::build_request(&context, family, 2048).prompt;
        for key in family.required_fields() {
            assert!(prompt.contains(key), "{:?} prompt lacks {}", family, key);
        }
    }
}

#[test]
fn test_classification_sends_leading_frames() {
    let context = video_context(12);
    let request = stage0_classify::build_request(&context, &TruncationBudgets::default(), 1024);

    assert_eq!(request.images.len(), CLASSIFICATION_IMAGES);
    assert_eq!(request.images[0].data, "frame-0");
    assert_eq!(request.images[4].data, "frame-4");
}

#[test]
fn test_extraction_sends_all_frames_with_timestamps() {
    let context = video_context(12);
    let request = stage1_extract::build_request(&context, TemplateFamily::Generic, 2048);

    assert_eq!(request.images.len(), 12);
    assert_eq!(request.images[11].data, "frame-11");
    assert!(request.prompt.contains("frame #1 at 00:00"));
    assert!(request.prompt.contains("frame #12 at 00:05"));
}

#[test]
fn test_qualitative_samples_every_fifth_frame() {
    let context = video_context(12);
    let data = ExtractedData::default();
    let request = stage3_qualitative::build_request(
        &context,
        &data,
        TemplateFamily::Generic,
        &TruncationBudgets::default(),
        4096,
    );

    let sent: Vec<&str> = request.images.iter().map(|i| i.data.as_str()).collect();
    assert_eq!(IMAGE_SAMPLE_STEP, 5);
    assert_eq!(sent, vec!["frame-0", "frame-5", "frame-10"]);
}

#[test]
fn test_text_only_stages_send_no_images() {
    let budgets = TruncationBudgets::default();
    let data = ExtractedData::default();

    assert!(stage2_quantitative::build_request(&data, TemplateFamily::Generic, 1)
        .images
        .is_empty());
    assert!(stage4_risk::build_request("a", "b", InvestmentType::Other, &budgets, 1)
        .images
        .is_empty());
    assert!(stage7_visualize::build_request("a", "b", "c", &budgets, 1)
        .images
        .is_empty());
}

#[test]
fn test_still_image_has_no_frame_list() {
    let context = AnalysisContext::new("q")
        .with_recognized_text("Asking price: $1,200,000")
        .with_still_image(image("still"));
    let request = stage1_extract::build_request(&context, TemplateFamily::Generic, 2048);

    assert_eq!(request.images.len(), 1);
    assert!(!request.prompt.contains("frame #1"));
    assert!(request.prompt.contains("Asking price: $1,200,000"));
}

#[test]
fn test_risk_inputs_truncated_to_budget() {
    let budgets = TruncationBudgets {
        risk_quantitative: 100,
        ..Default::default()
    };
    let quantitative = format!("{}{}", "a".repeat(100), "TAIL_MARKER");
    let request = stage4_risk::build_request(&quantitative, "", InvestmentType::Startup, &budgets, 1);

    assert!(request.prompt.contains(&"a".repeat(100)));
    assert!(!request.prompt.contains("TAIL_MARKER"));
}

#[test]
fn test_max_tokens_passed_through() {
    let request = stage2_quantitative::build_request(
        &ExtractedData::default(),
        TemplateFamily::RealEstate,
        4321,
    );
    assert_eq!(request.max_tokens, 4321);
}
