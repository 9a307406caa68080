//! Final report assembly
//!
//! Pure and deterministic: equal inputs give byte-identical reports.

use crate::analysis::types::{Classification, ExtractedData, VisualizationData};
use std::fmt::Write;

const BANNER_WIDTH: usize = 100;

/// Every stage output that goes into the report
#[derive(Debug, Clone, Copy)]
pub struct ReportSections<'a> {
    pub classification: &'a Classification,
    pub extracted: &'a ExtractedData,
    pub quantitative: &'a str,
    pub qualitative: &'a str,
    pub risk: &'a str,
    pub comparative: &'a str,
    pub synthesis: &'a str,
    pub visualization: &'a VisualizationData,
}

fn banner() -> String {
    "=".repeat(BANNER_WIDTH)
}

fn section(out: &mut String, title: &str, body: &str) {
    let line = banner();
    // Writing to a String cannot fail
    let _ = write!(out, "{line}\n{title}\n{line}\n\n{body}\n\n");
}

/// Concatenate the stage outputs in their fixed order
pub fn assemble_final_report(sections: &ReportSections<'_>) -> Result<String, serde_json::Error> {
    let extracted = serde_json::to_string_pretty(sections.extracted)?;
    let visualization = serde_json::to_string_pretty(sections.visualization)?;
    let classification = sections.classification;
    let line = banner();

    let mut out = String::new();
    let _ = write!(
        out,
        "\n{line}\nFULL FINANCIAL ANALYSIS\n{line}\n\n\
         INVESTMENT TYPE: {kind}\n   \
         Sector: {sector}\n   \
         Maturity: {maturity}\n   \
         Geography: {geography}\n   \
         Confidence: {confidence:.0}%\n\n",
        kind = classification.investment_type.as_str().to_uppercase(),
        sector = classification.sector.as_deref().unwrap_or("N/A"),
        maturity = classification.maturity.map(|m| m.as_str()).unwrap_or("N/A"),
        geography = classification.geography.as_deref().unwrap_or("N/A"),
        confidence = classification.confidence * 100.0,
    );

    section(&mut out, "STAGE 1: EXTRACTED AND VALIDATED DATA", &extracted);
    section(
        &mut out,
        "STAGE 2: QUANTITATIVE ANALYSIS (FINANCIAL DUE DILIGENCE)",
        sections.quantitative,
    );
    section(
        &mut out,
        "STAGE 3: QUALITATIVE ANALYSIS (MOAT, MANAGEMENT, STRATEGY)",
        sections.qualitative,
    );
    section(&mut out, "STAGE 4: RISK ANALYSIS", sections.risk);
    section(
        &mut out,
        "STAGE 5: COMPARATIVE EVALUATION AND BENCHMARKING",
        sections.comparative,
    );
    section(
        &mut out,
        "STAGE 6: SYNTHESIS AND FINAL DECISION",
        sections.synthesis,
    );
    section(
        &mut out,
        "STRUCTURED DATA FOR CHARTS",
        &format!("```json\n{}\n```", visualization),
    );
    out.push_str(&line);
    out.push('\n');

    Ok(out)
}

/// Report returned when the run could not be completed
pub fn failure_report(error: &str) -> String {
    format!("Analysis failed: {}", error)
}
