// src/core/classifier.rs — Navigation intent, deictic expansion, need hints
//
// Fixed-vocabulary pattern matching only. Anything that does not match is a
// question for the answering service.

use regex::Regex;
use std::sync::LazyLock;

use super::types::Need;

static NAVIGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:next(?:\s+step)?(?:\s+please)?|i\s*am\s*ready(?:\s+for\s+the\s+next\s+step)?|weiter)[.!]?$",
    )
    .expect("valid navigation regex")
});

static WHY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^why\??$").expect("valid regex"));
static HOW_LONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:how\s*long|time)\??$").expect("valid regex"));
static WHAT_NOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^what\s*(?:now|next)\??$").expect("valid regex"));
static HISTORY_ASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^what\s*about\s*the\s*history\??$").expect("valid regex")
});

static SCIENCE_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:science|why|chemistry|physics|emulsif\w*|gelatin\w*|denatur\w*|maillard)\b",
    )
    .expect("valid science regex")
});
static HISTORY_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:history|origin|where|when|traditional|invent\w*|etymolog\w*)\b")
        .expect("valid history regex")
});
// `when do` never fires: HISTORY_TERMS matches bare `when` and is checked first.
static TASK_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:how|what.*way|technique|temperature|time|when do|how long)\b")
        .expect("valid task regex")
});

/// True when the whole trimmed utterance is a request to move on.
pub fn is_navigation(text: &str) -> bool {
    NAVIGATION.is_match(text.trim())
}

/// Rewrite a bare deictic follow-up ("why?", "how long?") into a question that
/// names the current step. Everything else passes through untouched.
pub fn expand_question(raw: &str, step_text: &str) -> String {
    let t = raw.trim().to_lowercase();

    if WHY.is_match(&t) {
        return format!(
            "Why is this step done: \"{step_text}\"? Please explain the underlying rationale/science briefly."
        );
    }
    if HOW_LONG.is_match(&t) {
        return format!(
            "Approximately how long should I perform this step: \"{step_text}\"? Give a practical cue (appearance/texture)."
        );
    }
    if WHAT_NOW.is_match(&t) {
        return format!(
            "Given this current step, \"{step_text}\", what should I do within this step (not the next step)?"
        );
    }
    if HISTORY_ASK.is_match(&t) {
        return format!("What is the historical background relevant to this step: \"{step_text}\"?");
    }

    raw.to_string()
}

/// Keyword classifier. Science wins over history, history over task.
pub fn detect_need(text: &str) -> Option<Need> {
    let t = text.to_lowercase();
    if SCIENCE_TERMS.is_match(&t) {
        Some(Need::Science)
    } else if HISTORY_TERMS.is_match(&t) {
        Some(Need::History)
    } else if TASK_TERMS.is_match(&t) {
        Some(Need::Task)
    } else {
        None
    }
}

/// Need for a question: the expanded form first, then the raw utterance.
pub fn resolve_need(expanded: &str, raw: &str) -> Option<Need> {
    detect_need(expanded).or_else(|| detect_need(raw))
}
