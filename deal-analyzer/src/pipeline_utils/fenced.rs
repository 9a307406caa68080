//! Fenced-block extraction and decoding for structured model responses
//!
//! Model output is untrusted: the expected JSON may be missing, unterminated,
//! or malformed. Callers get either the decoded value or their own default,
//! never a panic.

use crate::error::ShapeError;
use serde::de::DeserializeOwned;
use tracing::warn;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Result of a lenient decode: the value plus the soft failure, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub fallback: Option<ShapeError>,
}

impl<T> Decoded<T> {
    pub fn used_default(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Locate the first structured block in `text`
///
/// A block tagged `json` wins. Without one, the first untagged fence is used
/// if its body looks like JSON. The block ends at the next fence.
pub fn locate_fenced_block(text: &str) -> Result<&str, ShapeError> {
    let lowered = text.to_ascii_lowercase();

    let body_start = if let Some(pos) = lowered.find(JSON_FENCE) {
        pos + JSON_FENCE.len()
    } else if let Some(pos) = text.find(FENCE) {
        // Skip an optional language tag on the opening line
        let after = pos + FENCE.len();
        match text[after..].find('\n') {
            Some(nl) => after + nl + 1,
            None => after,
        }
    } else {
        return Err(ShapeError::MissingBlock);
    };

    let rest = &text[body_start..];
    let body_end = rest.find(FENCE).ok_or(ShapeError::Unterminated)?;
    let body = rest[..body_end].trim();

    if !lowered[..body_start].contains(JSON_FENCE) && !looks_like_json(body) {
        return Err(ShapeError::MissingBlock);
    }

    Ok(body)
}

fn looks_like_json(body: &str) -> bool {
    body.starts_with('{') || body.starts_with('[')
}

/// Decode the first structured block, reporting why it failed
pub fn decode_fenced<T: DeserializeOwned>(text: &str) -> Result<T, ShapeError> {
    let block = locate_fenced_block(text)?;
    serde_json::from_str(block).map_err(|e| ShapeError::Decode(e.to_string()))
}

/// Decode the first structured block, or return `default`
///
/// Never fails. A missing or undecodable block is logged as a soft
/// failure and surfaced in [`Decoded::fallback`].
pub fn parse_structured_payload<T: DeserializeOwned>(text: &str, default: T) -> Decoded<T> {
    match decode_fenced(text) {
        Ok(value) => Decoded {
            value,
            fallback: None,
        },
        Err(err) => {
            warn!(error = %err, "structured payload unusable, using default");
            Decoded {
                value: default,
                fallback: Some(err),
            }
        }
    }
}
