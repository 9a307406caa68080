//! Pipeline utilities shared by every stage
//!
//! - **fenced**: fenced-block extraction and lenient decoding of model output
//! - **lenient**: serde helpers for model-produced numbers, strings and lists
//! - **stage**: stage-level logging and fail-soft execution
//! - **truncate**: char-budget truncation that never splits a fenced block

pub mod fenced;
pub mod lenient;
pub mod stage;
pub mod truncate;

pub use fenced::{decode_fenced, locate_fenced_block, parse_structured_payload, Decoded};
pub use stage::{error_placeholder, run_structured_stage, run_text_stage, StageContext, StageRun};
pub use truncate::{preview, truncate_chars};
