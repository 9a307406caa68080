// Multi-stage analysis pipeline
pub mod analysis;

// Shared stage helpers: fenced JSON, lenient decoding, truncation
pub mod pipeline_utils;

// Language-model gateway
pub mod gateway;

// Media preparation (transcripts, frames, OCR)
pub mod media;

// Report cache
pub mod store;

// Follow-up chat about a report
pub mod chat;

pub mod cli;
pub mod config;
pub mod error;
