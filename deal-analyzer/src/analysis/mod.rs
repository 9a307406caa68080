//! Multi-stage investment analysis
//!
//! Eight dependent model invocations: classification, data extraction,
//! quantitative and qualitative due diligence, risk analysis, comparative
//! evaluation, synthesis with a decision, and chart data. Each stage lives in
//! its own module with a pure `build_request` and an async runner.

pub mod prompts;
pub mod report;
pub mod stage0_classify;
pub mod stage1_extract;
pub mod stage2_quantitative;
pub mod stage3_qualitative;
pub mod stage4_risk;
pub mod stage5_comparative;
pub mod stage6_synthesis;
pub mod stage7_visualize;
pub mod types;
pub mod workflow;

pub use prompts::TemplateFamily;
pub use report::{assemble_final_report, ReportSections};
pub use types::{
    AnalysisContext, AnalysisOutcome, Classification, ContextImage, Decision, ExtractedData,
    ExtractedField, InvestmentType, Maturity, Stage, StagePayload, StageResult,
    VisualizationData, TOTAL_STAGES,
};
pub use workflow::AnalysisPipeline;
