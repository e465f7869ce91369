// src/core/extract.rs — Pull a usable answer out of raw model output
//
// Strict path: text after the last FINAL: marker, cut at the first code fence.
// Lenient path: the whole de-reasoned text. Either must be at least
// MIN_ANSWER_CHARS long or the output is rejected.

use regex::Regex;
use std::sync::LazyLock;

use super::FINAL_MARKER;

/// Shortest candidate accepted from either path.
pub const MIN_ANSWER_CHARS: usize = 8;

/// Hidden reasoning, closed or running to end of text.
static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?(?:</think>|$)").expect("valid think regex")
});

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FINAL\s*:").expect("valid marker regex"));

const CODE_FENCE: &str = "```";

/// Remove every `<think>…</think>` segment.
pub fn strip_reasoning(raw: &str) -> String {
    THINK_BLOCK.replace_all(raw, "").into_owned()
}

/// Content after the last marker, truncated at the first code fence and trimmed.
/// `None` when no marker is present.
pub fn marker_content(text: &str) -> Option<&str> {
    let last = MARKER.find_iter(text).last()?;
    let rest = &text[last.end()..];
    let rest = match rest.find(CODE_FENCE) {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    Some(rest.trim())
}

/// Final answer text, or `None` when nothing usable came back.
///
/// Marker answers are returned with the canonical `FINAL: ` prefix re-applied;
/// lenient answers are returned as-is.
pub fn extract_final(raw: &str) -> Option<String> {
    let cleaned = strip_reasoning(raw);

    if let Some(content) = marker_content(&cleaned) {
        if content.chars().count() >= MIN_ANSWER_CHARS {
            return Some(format!("{FINAL_MARKER} {content}"));
        }
    }

    let lenient = cleaned.trim();
    if lenient.chars().count() >= MIN_ANSWER_CHARS {
        return Some(lenient.to_string());
    }

    None
}
