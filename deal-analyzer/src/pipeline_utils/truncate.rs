//! Character-budget truncation for text embedded in downstream prompts

use std::borrow::Cow;

const FENCE: &str = "```";

/// Cut `text` to at most `max_chars` characters
///
/// Cuts on a char boundary. If the cut would land inside a fenced block the
/// whole block is dropped instead, so a downstream prompt never receives half
/// of a structured payload.
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    let cut = match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => byte_idx,
        None => return Cow::Borrowed(text),
    };

    // A partial fence marker at the cut is not a fence
    let mut prefix = text[..cut].trim_end_matches('`');

    if prefix.matches(FENCE).count() % 2 == 1 {
        if let Some(open) = prefix.rfind(FENCE) {
            prefix = &prefix[..open];
        }
    }

    Cow::Borrowed(prefix.trim_end())
}

/// Like [`truncate_chars`] but appends `...` when something was cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() == text.len() {
        text.to_string()
    } else {
        format!("{}...", cut)
    }
}
