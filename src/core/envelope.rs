// src/core/envelope.rs — Assembles the bounded request sent to the answering service
//
// Three parts: fixed assistant rules, a context block anchored on the current
// step, and the recent per-step conversation followed by the user message.

use super::types::{Need, Turn};
use super::FINAL_MARKER;
use crate::infra::config::AnsweringConfig;
use crate::provider::{ChatRequest, Message};

/// Most recent turns of the current step replayed to the model.
pub const HISTORY_WINDOW: usize = 8;

/// Where the user stands. `step_num` is 1-based and already clamped.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub title: &'a str,
    pub step_num: u32,
    pub total_steps: u32,
    pub step_text: &'a str,
    pub need: Option<Need>,
}

/// A complete request, before model parameters are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEnvelope {
    pub system: String,
    pub history: Vec<Message>,
    pub user_message: String,
}

impl PromptEnvelope {
    pub fn build(ctx: &StepContext<'_>, history: Vec<Message>, user_content: &str) -> Self {
        let system = format!(
            "{}\n\n{}\n\nIMPORTANT: Put the final answer after \"{FINAL_MARKER}\".",
            base_instructions(),
            context_block(ctx)
        );

        Self {
            system,
            history,
            user_message: user_message(ctx, user_content),
        }
    }

    /// Same request with the strict-format reminder appended. Used for the
    /// single retry after an unusable first answer.
    pub fn strict(&self) -> Self {
        Self {
            system: format!(
                "{}\n\nSTRICT: Answer in 1–3 sentences and START your final line with '{FINAL_MARKER} '.",
                self.system
            ),
            history: self.history.clone(),
            user_message: self.user_message.clone(),
        }
    }

    pub fn to_request(&self, config: &AnsweringConfig) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.user_message.clone()));

        ChatRequest {
            model: config.model.clone(),
            system: Some(self.system.clone()),
            messages,
            max_tokens: Some(config.max_output_tokens),
            temperature: Some(config.temperature),
            top_p: Some(config.top_p),
        }
    }
}

/// The last `HISTORY_WINDOW` turns, in stored order, as chat messages.
pub fn conversation_window(turns: &[Turn]) -> Vec<Message> {
    let start = turns.len().saturating_sub(HISTORY_WINDOW);
    turns[start..]
        .iter()
        .map(|t| Message {
            role: t.role.chat_role(),
            content: t.text.clone(),
        })
        .collect()
}

fn base_instructions() -> String {
    [
        "You are a cooking assistant helping with ONE recipe step at a time.",
        "Answer ONLY about the CURRENT step; do not preview future steps or recap the whole recipe.",
        "Be concise: 1–3 sentences (or up to 3 short bullets).",
        "If asked for an image/picture: apologize once and say you cannot show images.",
        "If you truly don't know, say \"I'm not sure\" and optionally add ONE practical tip or ask ONE brief clarifying question.",
        "",
        "Interpret short or deictic follow-ups relative to the CURRENT step:",
        "- If the user says \"why?\", answer why this step is done (the rationale/science).",
        "- If they say \"how long?\", give a practical timing/cue for this step.",
        "- If they say \"what now/next?\", keep them within the CURRENT step unless they explicitly say 'next'.",
        "",
        "IMPORTANT OUTPUT RULE:",
        format!(
            "Write your final answer starting with {FINAL_MARKER} and nothing else. Do not include JSON or code fences."
        )
        .as_str(),
        "You may think privately, but never show <think> or your reasoning.",
        "",
        "EXAMPLES",
        "User: why?",
        format!(
            "Assistant: {FINAL_MARKER} Boiling the water fully hydrates the flour and starts starch gelatinization, so the dough forms a smooth paste before eggs are added."
        )
        .as_str(),
        "User: how long?",
        format!(
            "Assistant: {FINAL_MARKER} Stir vigorously until the dough pulls cleanly from the pot and leaves a thin film, usually 1–3 minutes rather than a fixed clock."
        )
        .as_str(),
    ]
    .join("\n")
}

fn context_block(ctx: &StepContext<'_>) -> String {
    let mut lines = vec![
        "CONTEXT".to_string(),
        format!("- Recipe: {}", ctx.title),
        format!(
            "- Current step {}/{}: {}",
            ctx.step_num, ctx.total_steps, ctx.step_text
        ),
    ];
    if let Some(need) = ctx.need {
        lines.push(format!("- Need hint: {need}"));
    }
    lines.join("\n")
}

fn user_message(ctx: &StepContext<'_>, content: &str) -> String {
    let mut lines = vec![
        format!("Recipe: {}", ctx.title),
        format!(
            "Current step {}/{}: {}",
            ctx.step_num, ctx.total_steps, ctx.step_text
        ),
    ];
    if let Some(need) = ctx.need {
        lines.push(format!("NEED: {need}"));
    }
    lines.push(String::new());
    lines.push(format!("User: {content}"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TurnRole;
    use crate::provider::Role;
    use chrono::Utc;

    fn ctx(need: Option<Need>) -> StepContext<'static> {
        StepContext {
            title: "Choux Pastry",
            step_num: 3,
            total_steps: 6,
            step_text: "Stir until the dough pulls away from the sides.",
            need,
        }
    }

    fn turn(i: usize) -> Turn {
        Turn {
            id: i as i64,
            session_id: "s".into(),
            role: if i % 2 == 0 {
                TurnRole::User
            } else {
                TurnRole::Agent
            },
            step_id: 3,
            text: format!("turn {i}"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_carries_rules_context_and_marker() {
        let env = PromptEnvelope::build(&ctx(Some(Need::Science)), vec![], "why?");
        assert!(env.system.contains("ONE recipe step at a time"));
        assert!(env.system.contains("cannot show images"));
        assert!(env.system.contains("I'm not sure"));
        assert!(env.system.contains("starting with FINAL: and nothing else"));
        assert!(env.system.contains("- Recipe: Choux Pastry"));
        assert!(env.system.contains(
            "- Current step 3/6: Stir until the dough pulls away from the sides."
        ));
        assert!(env.system.contains("- Need hint: SCIENCE"));
        assert!(env.system.ends_with("Put the final answer after \"FINAL:\"."));
    }

    #[test]
    fn test_need_hint_omitted_when_absent() {
        let env = PromptEnvelope::build(&ctx(None), vec![], "hmm");
        assert!(!env.system.contains("Need hint"));
        assert!(!env.user_message.contains("NEED:"));
    }

    #[test]
    fn test_user_message_layout() {
        let env = PromptEnvelope::build(&ctx(Some(Need::Task)), vec![], "how hot?");
        assert_eq!(
            env.user_message,
            "Recipe: Choux Pastry\n\
             Current step 3/6: Stir until the dough pulls away from the sides.\n\
             NEED: TASK\n\
             \n\
             User: how hot?"
        );
    }

    #[test]
    fn test_empty_step_text_tolerated() {
        let c = StepContext {
            step_text: "",
            ..ctx(None)
        };
        let env = PromptEnvelope::build(&c, vec![], "why?");
        assert!(env.system.contains("- Current step 3/6: "));
    }

    #[test]
    fn test_strict_appends_only_to_system() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let env = PromptEnvelope::build(&ctx(None), history, "why?");
        let strict = env.strict();
        assert!(strict.system.starts_with(&env.system));
        assert!(strict.system.ends_with("START your final line with 'FINAL: '."));
        assert_eq!(strict.history, env.history);
        assert_eq!(strict.user_message, env.user_message);
    }

    #[test]
    fn test_to_request_appends_user_message_last() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let env = PromptEnvelope::build(&ctx(None), history, "why?");
        let config = AnsweringConfig::default();
        let req = env.to_request(&config);
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.max_tokens, Some(250));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2].role, Role::User);
        assert_eq!(req.messages[2].content, env.user_message);
        assert_eq!(req.system.as_deref(), Some(env.system.as_str()));
    }

    #[test]
    fn test_window_keeps_latest_eight_in_order() {
        let turns: Vec<Turn> = (0..50).map(turn).collect();
        let window = conversation_window(&turns);
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].content, "turn 42");
        assert_eq!(window[7].content, "turn 49");
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[1].role, Role::Assistant);
    }

    #[test]
    fn test_window_shorter_than_limit() {
        let turns: Vec<Turn> = (0..3).map(turn).collect();
        assert_eq!(conversation_window(&turns).len(), 3);
        assert!(conversation_window(&[]).is_empty());
    }
}
