//! Data structures threaded through an analysis run

use crate::gateway::ImageAttachment;
use crate::pipeline_utils::lenient;
use crate::pipeline_utils::StageContext;
use deal_analyzer_sdk::StageStatus;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Number of stages in a run
pub const TOTAL_STAGES: usize = 8;

/// The eight pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Extraction,
    Quantitative,
    Qualitative,
    Risk,
    Comparative,
    Synthesis,
    Visualization,
}

impl Stage {
    pub const ALL: [Stage; TOTAL_STAGES] = [
        Stage::Classification,
        Stage::Extraction,
        Stage::Quantitative,
        Stage::Qualitative,
        Stage::Risk,
        Stage::Comparative,
        Stage::Synthesis,
        Stage::Visualization,
    ];

    pub fn index(self) -> usize {
        match self {
            Stage::Classification => 0,
            Stage::Extraction => 1,
            Stage::Quantitative => 2,
            Stage::Qualitative => 3,
            Stage::Risk => 4,
            Stage::Comparative => 5,
            Stage::Synthesis => 6,
            Stage::Visualization => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Classification => "Classification",
            Stage::Extraction => "Data Extraction",
            Stage::Quantitative => "Quantitative Due Diligence",
            Stage::Qualitative => "Qualitative Due Diligence",
            Stage::Risk => "Risk Analysis",
            Stage::Comparative => "Comparative Evaluation",
            Stage::Synthesis => "Synthesis & Decision",
            Stage::Visualization => "Visualization Data",
        }
    }

    pub fn context(self) -> StageContext {
        StageContext {
            index: self.index(),
            name: self.name(),
            total: TOTAL_STAGES,
        }
    }
}

/// An image available to the run, optionally tied to a video timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ContextImage {
    pub image: ImageAttachment,
    pub timestamp_seconds: Option<f64>,
}

/// Everything the pipeline knows about the uploaded material
///
/// Transcript lines may carry `[mm:ss - mm:ss]` segment ranges. Video input
/// fills `images` with timestamped frames; a still image is a single
/// unannotated entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisContext {
    pub user_query: String,
    pub transcript: Option<String>,
    pub recognized_text: Option<String>,
    pub images: Vec<ContextImage>,
}

impl AnalysisContext {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_recognized_text(mut self, text: impl Into<String>) -> Self {
        self.recognized_text = Some(text.into());
        self
    }

    pub fn with_frame(mut self, image: ImageAttachment, timestamp_seconds: f64) -> Self {
        self.images.push(ContextImage {
            image,
            timestamp_seconds: Some(timestamp_seconds),
        });
        self
    }

    pub fn with_still_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(ContextImage {
            image,
            timestamp_seconds: None,
        });
        self
    }

    /// Non-blank transcript, if any
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Non-blank recognized text, if any
    pub fn recognized_text(&self) -> Option<&str> {
        self.recognized_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Timestamps of the frames that have one, in frame order
    pub fn frame_timestamps(&self) -> Vec<(usize, f64)> {
        self.images
            .iter()
            .enumerate()
            .filter_map(|(i, img)| img.timestamp_seconds.map(|ts| (i, ts)))
            .collect()
    }

    /// First `limit` images as attachments
    pub fn leading_images(&self, limit: usize) -> Vec<ImageAttachment> {
        self.images
            .iter()
            .take(limit)
            .map(|img| img.image.clone())
            .collect()
    }

    /// Every `step`-th image (positions 0, step, 2*step, ...)
    pub fn sampled_images(&self, step: usize) -> Vec<ImageAttachment> {
        self.images
            .iter()
            .step_by(step.max(1))
            .map(|img| img.image.clone())
            .collect()
    }

    pub fn all_images(&self) -> Vec<ImageAttachment> {
        self.images.iter().map(|img| img.image.clone()).collect()
    }
}

/// Investment category decided at stage 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentType {
    RealEstate,
    BusinessAcquisition,
    Startup,
    PublicEquity,
    Bonds,
    PrivateEquity,
    Portfolio,
    #[default]
    Other,
}

impl InvestmentType {
    pub const ALL: [InvestmentType; 8] = [
        InvestmentType::RealEstate,
        InvestmentType::BusinessAcquisition,
        InvestmentType::Startup,
        InvestmentType::PublicEquity,
        InvestmentType::Bonds,
        InvestmentType::PrivateEquity,
        InvestmentType::Portfolio,
        InvestmentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentType::RealEstate => "real_estate",
            InvestmentType::BusinessAcquisition => "business_acquisition",
            InvestmentType::Startup => "startup",
            InvestmentType::PublicEquity => "public_equity",
            InvestmentType::Bonds => "bonds",
            InvestmentType::PrivateEquity => "private_equity",
            InvestmentType::Portfolio => "portfolio",
            InvestmentType::Other => "other",
        }
    }

    /// Map a model-produced label; anything unrecognized is `Other`
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "real_estate" | "realestate" | "immobilier" => InvestmentType::RealEstate,
            "business_acquisition" | "acquisition" | "acquisition_entreprise" => {
                InvestmentType::BusinessAcquisition
            }
            "startup" | "start_up" => InvestmentType::Startup,
            "public_equity" | "public_equities" | "actions_publiques" => {
                InvestmentType::PublicEquity
            }
            "bonds" | "bond" | "obligations" => InvestmentType::Bonds,
            "private_equity" => InvestmentType::PrivateEquity,
            "portfolio" | "portefeuille" => InvestmentType::Portfolio,
            _ => InvestmentType::Other,
        }
    }
}

impl fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InvestmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(InvestmentType::from_label)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maturity {
    #[serde(alias = "early-stage", alias = "early stage", alias = "seed")]
    EarlyStage,
    #[serde(alias = "croissance")]
    Growth,
    Mature,
    #[serde(alias = "déclin", alias = "declin", alias = "declining")]
    Decline,
}

impl Maturity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::EarlyStage => "early_stage",
            Maturity::Growth => "growth",
            Maturity::Mature => "mature",
            Maturity::Decline => "decline",
        }
    }
}

/// Stage 0 output; read by every later stage, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type", alias = "investment_type", default)]
    pub investment_type: InvestmentType,
    #[serde(default, alias = "secteur", deserialize_with = "lenient::option_string")]
    pub sector: Option<String>,
    #[serde(default, alias = "maturite", deserialize_with = "lenient::option_of")]
    pub maturity: Option<Maturity>,
    #[serde(default, alias = "geographie", deserialize_with = "lenient::option_string")]
    pub geography: Option<String>,
    #[serde(
        default,
        alias = "taille_investissement_estimee",
        deserialize_with = "lenient::option_number"
    )]
    pub estimated_size: Option<f64>,
    #[serde(default, alias = "confiance", deserialize_with = "lenient::number")]
    pub confidence: f64,
    #[serde(default, alias = "raison", deserialize_with = "lenient::option_string")]
    pub rationale: Option<String>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            investment_type: InvestmentType::Other,
            sector: None,
            maturity: None,
            geography: None,
            estimated_size: None,
            confidence: 0.0,
            rationale: None,
        }
    }
}

impl Classification {
    /// Clamp confidence into `[0, 1]`
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// One extracted fact with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    #[serde(default, alias = "valeur")]
    pub value: Value,
    /// Where in the material the value was found, e.g. `audio 01:32` or `frame #4`
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default, alias = "confiance", deserialize_with = "lenient::number")]
    pub confidence: f64,
}

/// Stage 1 output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default, alias = "donnees", deserialize_with = "lenient_fields")]
    pub fields: BTreeMap<String, ExtractedField>,
    #[serde(
        default,
        alias = "donnees_manquantes",
        deserialize_with = "lenient::list_of"
    )]
    pub missing_fields: Vec<String>,
    #[serde(default, alias = "incoherences", deserialize_with = "lenient::list_of")]
    pub inconsistencies: Vec<String>,
}

/// Accept both `{value, source, confidence}` objects and bare values
fn lenient_fields<'de, D>(deserializer: D) -> Result<BTreeMap<String, ExtractedField>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };

    Ok(map
        .into_iter()
        .map(|(name, raw)| {
            let is_field = raw
                .as_object()
                .is_some_and(|obj| obj.contains_key("value") || obj.contains_key("valeur"));
            let field = if is_field {
                serde_json::from_value(raw).unwrap_or(ExtractedField {
                    value: Value::Null,
                    source: String::new(),
                    confidence: 0.0,
                })
            } else {
                ExtractedField {
                    value: raw,
                    source: String::new(),
                    confidence: 0.0,
                }
            };
            (name, field)
        })
        .collect())
}

impl ExtractedData {
    /// Enforce traceability and completeness
    ///
    /// Null values move to `missing_fields`, values without a source are
    /// dropped and reported as inconsistencies, and every required key that
    /// is still absent is listed as missing.
    pub fn enforce(mut self, required: &[&str]) -> Self {
        let fields = std::mem::take(&mut self.fields);

        for (name, field) in fields {
            if field.value.is_null() {
                self.note_missing(&name);
            } else if field.source.trim().is_empty() {
                self.inconsistencies
                    .push(format!("{}: value reported without a source", name));
            } else {
                self.fields.insert(name, field);
            }
        }

        for key in required {
            if !self.fields.contains_key(*key) {
                self.note_missing(key);
            }
        }

        self
    }

    fn note_missing(&mut self, name: &str) {
        if !self.missing_fields.iter().any(|m| m == name) {
            self.missing_fields.push(name.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// JSON rendering that fits in `budget` chars and always stays valid
    ///
    /// Whole fields are dropped (in key order) rather than cutting the text.
    pub fn condensed(&self, budget: usize) -> String {
        let full = self.to_pretty_json();
        if full.chars().count() <= budget {
            return full;
        }

        let fits = |data: &ExtractedData| {
            serde_json::to_string(data)
                .map(|json| json.chars().count() <= budget)
                .unwrap_or(false)
        };

        let mut kept = ExtractedData::default();
        for (name, field) in &self.fields {
            kept.fields.insert(name.clone(), field.clone());
            if !fits(&kept) {
                kept.fields.remove(name);
            }
        }
        for missing in &self.missing_fields {
            kept.missing_fields.push(missing.clone());
            if !fits(&kept) {
                kept.missing_fields.pop();
            }
        }
        for issue in &self.inconsistencies {
            kept.inconsistencies.push(issue.clone());
            if !fits(&kept) {
                kept.inconsistencies.pop();
            }
        }

        serde_json::to_string(&kept).unwrap_or_else(|_| "{}".to_string())
    }
}

/// What a stage left in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StagePayload {
    /// Bounded preview of a free-text output
    Text(String),
    Structured(Value),
}

/// One entry per executed stage, success or fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_index: usize,
    pub name: String,
    pub status: StageStatus,
    pub payload: StagePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Final investment recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Buy,
    Negotiate,
    Pass,
    #[default]
    Incomplete,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Negotiate => "NEGOTIATE",
            Decision::Pass => "PASS",
            Decision::Incomplete => "INCOMPLETE",
        }
    }

    /// Map a decision label, accepting the legacy French vocabulary
    pub fn from_label(label: &str) -> Self {
        let upper = label.trim().to_uppercase();
        if upper.starts_with("BUY") || upper.starts_with("ACHETER") {
            Decision::Buy
        } else if upper.starts_with("NEGOTIATE")
            || upper.starts_with("NÉGOCIER")
            || upper.starts_with("NEGOCIER")
        {
            Decision::Negotiate
        } else if upper.starts_with("PASS") {
            Decision::Pass
        } else {
            Decision::Incomplete
        }
    }

    /// Find the decision marker in a synthesis text
    ///
    /// The last bold marker in the text wins (`**BUY**`, `**NEGOTIATE...`,
    /// `**PASS**`), so an echoed option list does not shadow the conclusion.
    /// Bare upper-case words are the fallback, again last one wins.
    pub fn detect(text: &str) -> Option<Decision> {
        const BOLD: [(&str, Decision); 6] = [
            ("**BUY**", Decision::Buy),
            ("**ACHETER**", Decision::Buy),
            ("**NEGOTIATE", Decision::Negotiate),
            ("**NÉGOCIER", Decision::Negotiate),
            ("**PASS**", Decision::Pass),
            ("**PASSER**", Decision::Pass),
        ];

        let last_bold = BOLD
            .iter()
            .filter_map(|(marker, decision)| text.rfind(marker).map(|pos| (pos, *decision)))
            .max_by_key(|(pos, _)| *pos);
        if let Some((_, decision)) = last_bold {
            return Some(decision);
        }

        text.split(|c: char| !c.is_alphanumeric())
            .rev()
            .find_map(|word| match word {
                "BUY" => Some(Decision::Buy),
                "NEGOTIATE" => Some(Decision::Negotiate),
                "PASS" => Some(Decision::Pass),
                _ => None,
            })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(Decision::from_label)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationSummary {
    #[serde(alias = "investissement", deserialize_with = "lenient::number")]
    pub investment: f64,
    #[serde(alias = "valeur_intrinseque", deserialize_with = "lenient::number")]
    pub intrinsic_value: f64,
    #[serde(alias = "prix_demande", deserialize_with = "lenient::number")]
    pub asking_price: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub margin_of_safety_pct: f64,
    #[serde(alias = "roi_annuel_pct", deserialize_with = "lenient::number")]
    pub annual_roi_pct: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub cap_rate_pct: f64,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashflowYear {
    #[serde(alias = "annee", deserialize_with = "lenient::number")]
    pub year: f64,
    #[serde(alias = "revenus", deserialize_with = "lenient::number")]
    pub revenue: f64,
    #[serde(alias = "depenses", deserialize_with = "lenient::number")]
    pub expenses: f64,
    #[serde(alias = "cf_net", deserialize_with = "lenient::number")]
    pub net_cash_flow: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueScenarios {
    #[serde(alias = "pessimiste", deserialize_with = "lenient::number")]
    pub pessimistic: f64,
    #[serde(alias = "realiste", deserialize_with = "lenient::number")]
    pub realistic: f64,
    #[serde(alias = "optimiste", deserialize_with = "lenient::number")]
    pub optimistic: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPoint {
    #[serde(alias = "nom", deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(alias = "impact_financier", deserialize_with = "lenient::number")]
    pub financial_impact: f64,
    #[serde(alias = "probabilite_pct", deserialize_with = "lenient::number")]
    pub probability_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiPoint {
    #[serde(alias = "annee", deserialize_with = "lenient::number")]
    pub year: f64,
    #[serde(alias = "valeur_portfolio", deserialize_with = "lenient::number")]
    pub portfolio_value: f64,
    #[serde(alias = "cf_cumule", deserialize_with = "lenient::number")]
    pub cumulative_cash_flow: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub roi_pct: f64,
}

/// Stage 7 output: fixed chart schema, every number an `f64`
///
/// The default is the all-zero schema with decision `INCOMPLETE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationData {
    #[serde(deserialize_with = "lenient::or_default")]
    pub summary: VisualizationSummary,
    #[serde(deserialize_with = "lenient::list_of")]
    pub cashflow_projection: Vec<CashflowYear>,
    #[serde(alias = "valeur_scenarios", deserialize_with = "lenient::or_default")]
    pub value_scenarios: ValueScenarios,
    #[serde(alias = "risques", deserialize_with = "lenient::list_of")]
    pub risks: Vec<RiskPoint>,
    #[serde(deserialize_with = "lenient::list_of")]
    pub roi_timeline: Vec<RoiPoint>,
}

/// What a run hands back to its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub report: String,
    pub elapsed_seconds: f64,
    /// `None` when the run failed before classification finished
    pub investment_type: Option<InvestmentType>,
    pub stage_log: Vec<StageResult>,
    /// Set when the top-level guard tripped
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn degraded_stages(&self) -> Vec<usize> {
        self.stage_log
            .iter()
            .filter(|r| r.status == StageStatus::Degraded)
            .map(|r| r.stage_index)
            .collect()
    }
}
