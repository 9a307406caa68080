//! Follow-up chat about a finished report
//!
//! A single model call per question: the persona as system prompt, the report
//! as the opening user turn, a fixed acknowledgement, the prior turns, then the
//! new question. Failures never surface to the caller; the user gets an
//! apology and the error goes to the log.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::AnalyzerConfig;
use crate::gateway::{ChatRole, ChatTurn, GenerationRequest, LanguageModel};
use crate::pipeline_utils::truncate_chars;

pub const CHAT_PERSONA: &str = "You are a veteran value investor with decades of experience. \
You just finished a detailed multi-stage analysis for the user and are now discussing it with them.\n\n\
- Speak plainly, use concrete analogies, and keep answers to 2-4 paragraphs.\n\
- Focus on intrinsic value, durable moats, cash flows and a margin of safety.\n\
- Base every figure on the analysis provided; if something is not in it, say so.\n\
- Do extra calculations when asked, and stay consistent with the analysis conclusions.";

pub const ACKNOWLEDGEMENT: &str =
    "I have the full analysis in mind. Ready to discuss it and answer your questions.";

pub const APOLOGY: &str =
    "Sorry, I ran into a technical problem. Could you rephrase your question?";

const TRUNCATION_NOTE: &str =
    "... (analysis truncated for the conversation, but you remember all of it)";

/// Question answering over a finished report
#[derive(Clone)]
pub struct AnalysisChat {
    model: Arc<dyn LanguageModel>,
    report_budget: usize,
    max_tokens: u32,
}

impl AnalysisChat {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let config = AnalyzerConfig::default();
        Self::from_config(model, &config)
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &AnalyzerConfig) -> Self {
        Self {
            model,
            report_budget: config.budgets.chat_report,
            max_tokens: config.max_tokens.chat,
        }
    }

    /// Build the request for `question` without sending it
    pub fn build_request(&self, question: &str, report: &str, history: &[ChatTurn]) -> GenerationRequest {
        let excerpt = truncate_chars(report, self.report_budget);
        let note = if excerpt.len() < report.len() {
            TRUNCATION_NOTE
        } else {
            ""
        };

        let context = format!(
            "=== CONVERSATION CONTEXT ===\n\n\
             Here is the FULL ANALYSIS you produced for the user:\n\n\
             {excerpt}\n\n{note}\n\n---\n\n\
             The user has read this analysis and now wants to ask questions to \
             understand or dig into some points."
        );

        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ChatTurn {
            role: ChatRole::User,
            content: context,
        });
        turns.push(ChatTurn {
            role: ChatRole::Assistant,
            content: ACKNOWLEDGEMENT.to_string(),
        });
        turns.extend_from_slice(history);

        GenerationRequest::new(question, self.max_tokens)
            .with_system(CHAT_PERSONA)
            .with_history(turns)
    }

    /// Answer `question` about `report`
    pub async fn ask(&self, question: &str, report: &str, history: &[ChatTurn]) -> String {
        let request = self.build_request(question, report, history);
        info!(history = history.len(), "answering follow-up question");

        match self.model.generate(request).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "chat request failed");
                APOLOGY.to_string()
            }
        }
    }
}

/// Running conversation about one report
pub struct ChatSession {
    chat: AnalysisChat,
    report: String,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(chat: AnalysisChat, report: impl Into<String>) -> Self {
        Self {
            chat,
            report: report.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Ask and remember both sides of the exchange
    pub async fn ask(&mut self, question: &str) -> String {
        let answer = self.chat.ask(question, &self.report, &self.history).await;
        self.history.push(ChatTurn {
            role: ChatRole::User,
            content: question.to_string(),
        });
        self.history.push(ChatTurn {
            role: ChatRole::Assistant,
            content: answer.clone(),
        });
        answer
    }
}
