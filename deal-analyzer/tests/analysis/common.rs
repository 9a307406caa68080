//! Common test utilities for analysis tests

#![allow(dead_code)]

use async_trait::async_trait;
use deal_analyzer::analysis::{AnalysisContext, AnalysisPipeline};
use deal_analyzer::error::GenerationError;
use deal_analyzer::gateway::{GenerationRequest, ImageAttachment, LanguageModel};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the scripted model does on one call
pub enum Reply {
    Text(String),
    Fail,
    Panic,
}

pub fn text(body: &str) -> Reply {
    Reply::Text(body.to_string())
}

/// Language model double answering from a queue, in call order
///
/// Calls beyond the script fail with `EmptyResponse`.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request(&self, index: usize) -> GenerationRequest {
        self.requests()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(body)) => Ok(body),
            Some(Reply::Fail) => Err(GenerationError::Transport(
                "connection reset by peer".to_string(),
            )),
            Some(Reply::Panic) => panic!("scripted model panic"),
            None => Err(GenerationError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn pipeline(model: &Arc<ScriptedModel>) -> AnalysisPipeline {
    AnalysisPipeline::new(model.clone())
}

pub fn fenced(json: &str) -> String {
    format!("Here is the result:\n```json\n{}\n```\n", json)
}

pub const REAL_ESTATE_CLASSIFICATION: &str = r#"{
  "type": "real_estate",
  "sector": "Multifamily residential",
  "maturity": "mature",
  "geography": "Quebec City",
  "estimated_size": 540000,
  "confidence": 0.92,
  "rationale": "Walkthrough of a 12-unit building"
}"#;

pub const REAL_ESTATE_EXTRACTION: &str = r#"{
  "fields": {
    "unit_count": {"value": 12, "source": "audio 00:05", "confidence": 0.95},
    "price_per_unit": {"value": 45000, "source": "audio 00:12", "confidence": 0.9},
    "rental_income": {"value": "2,200$/month", "source": "frame #2", "confidence": 0.8},
    "occupancy_rate": {"value": null, "source": "", "confidence": 0}
  },
  "missing_fields": ["property_taxes"],
  "inconsistencies": []
}"#;

pub const REAL_ESTATE_VISUALIZATION: &str = r#"{
  "summary": {
    "investment": "$540,000",
    "intrinsic_value": 600000,
    "asking_price": 540000,
    "margin_of_safety_pct": "11%",
    "annual_roi_pct": 9.5,
    "cap_rate_pct": 8.2,
    "decision": "NEGOTIATE"
  },
  "cashflow_projection": [
    {"year": 1, "revenue": 316800, "expenses": 120000, "net_cash_flow": 196800}
  ],
  "value_scenarios": {"pessimistic": 480000, "realistic": 600000, "optimistic": 700000},
  "risks": [{"name": "Vacancy", "financial_impact": 26400, "probability_pct": 20}],
  "roi_timeline": [{"year": 1, "portfolio_value": 600000, "cumulative_cash_flow": 196800, "roi_pct": 9.5}]
}"#;

pub const SYNTHESIS_NEGOTIATE: &str = "Solid cash flow, thin margin of safety.\n\n**NEGOTIATE AT $480,000**";

/// A complete, well-formed eight-call script for the real-estate walkthrough
pub fn real_estate_script() -> Vec<Reply> {
    vec![
        Reply::Text(fenced(REAL_ESTATE_CLASSIFICATION)),
        Reply::Text(fenced(REAL_ESTATE_EXTRACTION)),
        text("Gross rent 12 x 2,200 x 12 = 316,800. Cap rate = 8.2%"),
        text("Strong location, dated building envelope."),
        text("Top risk: vacancy. Impact $26,400/yr."),
        text("Price per unit below local comparables."),
        text(SYNTHESIS_NEGOTIATE),
        Reply::Text(fenced(REAL_ESTATE_VISUALIZATION)),
    ]
}

pub fn real_estate_context() -> AnalysisContext {
    AnalysisContext::new("Should I buy this building?")
        .with_transcript(
            "[00:00 - 00:05] Here we have a 12 unit building\n\
             [00:05 - 00:12] asking 45,000 dollars per unit\n\
             [00:12 - 00:20] each unit rents for 2,200 a month",
        )
        .with_frame(image("frame-0"), 0.0)
        .with_frame(image("frame-1"), 0.5)
        .with_frame(image("frame-2"), 1.0)
}

pub fn image(data: &str) -> ImageAttachment {
    ImageAttachment::jpeg(data)
}

/// Context with `count` timestamped frames named `frame-<i>`
pub fn video_context(count: usize) -> AnalysisContext {
    (0..count).fold(AnalysisContext::new("Worth it?"), |ctx, i| {
        ctx.with_frame(image(&format!("frame-{}", i)), i as f64 * 0.5)
    })
}
