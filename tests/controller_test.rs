// tests/controller_test.rs — Integration test: turn controller with a scripted provider

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use stepchef::core::controller::{
    TurnController, TurnError, NOT_SURE_FALLBACK, SERVICE_FAILURE_FALLBACK,
};
use stepchef::core::envelope::HISTORY_WINDOW;
use stepchef::core::ports::{RecipeCatalog, SessionStore, TurnStore};
use stepchef::core::types::{NewTurn, TurnInput, TurnOutcome, TurnRole};
use stepchef::infra::config::AnsweringConfig;
use stepchef::infra::errors::StepChefError;
use stepchef::memory::{spawn_store_server, Store, StoreHandle};
use stepchef::provider::*;
use stepchef::recipe::{Catalog, Recipe};

/// Replays canned replies in order and records every request it receives.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, StepChefError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<String, StepChefError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn ok(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn provider_down() -> StepChefError {
    StepChefError::Provider {
        provider: "mock".into(),
        message: "connection refused".into(),
        retriable: true,
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, StepChefError> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(provider_down()));
        next.map(|content| ChatResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
        })
    }
}

fn three_step_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_recipes(vec![Recipe {
        id: "toast".into(),
        title: "Toast".into(),
        steps: vec![
            "Slice the bread.".into(),
            "Toast until golden.".into(),
            "Butter while hot.".into(),
        ],
    }]))
}

struct Harness {
    store: StoreHandle,
    provider: Arc<ScriptedProvider>,
    controller: TurnController,
}

impl Harness {
    fn new(provider: Arc<ScriptedProvider>) -> Self {
        let store = Store::open_in_memory().unwrap();
        let (handle, _task) = spawn_store_server(store);
        let catalog = three_step_catalog();

        let sessions: Arc<dyn SessionStore> = Arc::new(handle.clone());
        let turns: Arc<dyn TurnStore> = Arc::new(handle.clone());
        let recipes: Arc<dyn RecipeCatalog> = catalog;
        let controller = TurnController::new(
            sessions,
            turns,
            recipes,
            provider.clone(),
            AnsweringConfig::default(),
        );

        Self {
            store: handle,
            provider,
            controller,
        }
    }

    async fn session(&self, id: &str) -> String {
        self.store
            .insert_session(id.into(), "user-1".into(), "toast".into())
            .await
            .unwrap();
        id.to_string()
    }

    async fn send(&self, session_id: &str, content: &str) -> Result<TurnOutcome, TurnError> {
        self.controller
            .handle_message(TurnInput::new(session_id, content))
            .await
    }

    async fn step(&self, session_id: &str) -> i64 {
        self.store
            .get_session(session_id.into())
            .await
            .unwrap()
            .unwrap()
            .current_step
    }
}

#[tokio::test]
async fn test_next_walks_to_the_end_then_finishes() {
    let h = Harness::new(ScriptedProvider::ok(&[]));
    let sid = h.session("s1").await;

    assert_eq!(h.send(&sid, "next").await.unwrap(), TurnOutcome::StepAdvance);
    assert_eq!(h.step(&sid).await, 2);

    // Landing on the final step reports it directly.
    assert_eq!(
        h.send(&sid, "Next Step").await.unwrap(),
        TurnOutcome::StepAdvanceLast
    );
    assert_eq!(h.step(&sid).await, 3);

    assert_eq!(h.send(&sid, "next").await.unwrap(), TurnOutcome::Finished);
    let session = h.store.get_session(sid.clone()).await.unwrap().unwrap();
    assert!(session.ended_at.is_some());
    assert_eq!(session.current_step, 3);

    assert!(h.provider.requests().is_empty());
}

#[tokio::test]
async fn test_finished_session_is_idempotent() {
    let h = Harness::new(ScriptedProvider::ok(&[]));
    let sid = h.session("s1").await;
    h.send(&sid, "next").await.unwrap();
    h.send(&sid, "next").await.unwrap();
    h.send(&sid, "next").await.unwrap();

    let first_end = h
        .store
        .get_session(sid.clone())
        .await
        .unwrap()
        .unwrap()
        .ended_at;

    assert_eq!(h.send(&sid, "weiter").await.unwrap(), TurnOutcome::Finished);
    assert_eq!(h.send(&sid, "NEXT").await.unwrap(), TurnOutcome::Finished);

    let session = h.store.get_session(sid.clone()).await.unwrap().unwrap();
    assert_eq!(session.ended_at, first_end);
    assert_eq!(session.current_step, 3);
}

#[tokio::test]
async fn test_every_message_is_logged_as_user_turn() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Slice about a centimetre thick."]));
    let sid = h.session("s1").await;

    h.send(&sid, "how thick?").await.unwrap();
    h.send(&sid, "next").await.unwrap();

    let turns = h.store.list_transcript(sid.clone()).await.unwrap();
    let summary: Vec<(u32, TurnRole, &str)> = turns
        .iter()
        .map(|t| (t.step_id, t.role, t.text.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, TurnRole::User, "how thick?"),
            (1, TurnRole::Agent, "FINAL: Slice about a centimetre thick."),
            (1, TurnRole::User, "next"),
        ]
    );
}

#[tokio::test]
async fn test_answer_uses_marker_text() {
    let h = Harness::new(ScriptedProvider::ok(&[
        "<think>user wants timing</think>FINAL: Toast for about 2 minutes.",
    ]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how long should it take").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: "FINAL: Toast for about 2 minutes.".into()
        }
    );
    assert_eq!(h.provider.requests().len(), 1);
    assert_eq!(h.step(&sid).await, 1);
}

#[tokio::test]
async fn test_deictic_question_is_expanded_in_request() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Even slices toast evenly."]));
    let sid = h.session("s1").await;

    h.send(&sid, "why?").await.unwrap();

    let requests = h.provider.requests();
    let last = requests[0].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.contains("Slice the bread."));
    assert!(last.content.contains("Current step 1/3"));
    assert!(last.content.contains("NEED: SCIENCE"));
    assert!(!last.content.ends_with("User: why?"));
}

#[tokio::test]
async fn test_short_answer_triggers_one_strict_retry() {
    let h = Harness::new(ScriptedProvider::ok(&[
        "FINAL: x",
        "FINAL: Slice it about one centimetre thick.",
    ]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how thick?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: "FINAL: Slice it about one centimetre thick.".into()
        }
    );

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 2);
    let first = requests[0].system.as_deref().unwrap();
    let second = requests[1].system.as_deref().unwrap();
    assert!(second.starts_with(first));
    assert!(second.contains("STRICT"));
    assert_eq!(requests[0].messages, requests[1].messages);
}

#[tokio::test]
async fn test_unusable_twice_gives_not_sure_fallback() {
    let h = Harness::new(ScriptedProvider::ok(&["ok", "<think>hmm"]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how thick?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: NOT_SURE_FALLBACK.into()
        }
    );
    assert_eq!(h.provider.requests().len(), 2);
}

#[tokio::test]
async fn test_provider_failure_becomes_fallback_turn() {
    let h = Harness::new(ScriptedProvider::new(vec![
        Err(provider_down()),
        Err(provider_down()),
    ]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how thick?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: SERVICE_FAILURE_FALLBACK.into()
        }
    );
    // A failed first attempt is not retried.
    assert_eq!(h.provider.requests().len(), 1);

    let agent_turns: Vec<_> = h
        .store
        .list_transcript(sid.clone())
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.role == TurnRole::Agent)
        .collect();
    assert_eq!(agent_turns.len(), 1);
    assert_eq!(agent_turns[0].text, SERVICE_FAILURE_FALLBACK);
}

#[tokio::test]
async fn test_failure_on_retry_also_falls_back() {
    let h = Harness::new(ScriptedProvider::new(vec![
        Ok("ok".into()),
        Err(provider_down()),
    ]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how thick?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: SERVICE_FAILURE_FALLBACK.into()
        }
    );
    assert_eq!(h.provider.requests().len(), 2);
}

#[tokio::test]
async fn test_history_window_is_bounded_and_ordered() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Keep slicing evenly."]));
    let sid = h.session("s1").await;

    for i in 0..50 {
        let turn = if i % 2 == 0 {
            NewTurn::user(&sid, 1, format!("turn {i}"))
        } else {
            NewTurn::agent(&sid, 1, format!("turn {i}"))
        };
        h.store.append_turn(turn).await.unwrap();
    }
    // A turn on another step never enters the window.
    h.store
        .append_turn(NewTurn::user(&sid, 2, "other step"))
        .await
        .unwrap();

    h.send(&sid, "anything else?").await.unwrap();

    let request = &h.provider.requests()[0];
    let (history, user) = request.messages.split_at(request.messages.len() - 1);
    assert_eq!(history.len(), HISTORY_WINDOW);
    let texts: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "turn 43", "turn 44", "turn 45", "turn 46", "turn 47", "turn 48", "turn 49",
            "anything else?"
        ]
    );
    assert_eq!(history[0].role, Role::Assistant);
    assert_eq!(history[7].role, Role::User);
    assert!(user[0].content.ends_with("User: anything else?"));
}

#[tokio::test]
async fn test_history_ends_with_raw_user_turn() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Even slices toast evenly."]));
    let sid = h.session("s1").await;

    h.send(&sid, "why?").await.unwrap();

    let request = &h.provider.requests()[0];
    let (history, user) = request.messages.split_at(request.messages.len() - 1);
    let texts: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["why?"]);
    assert_eq!(history[0].role, Role::User);
    // The expanded question goes in the envelope message, not the history.
    assert!(user[0].content.contains("Why is this step done"));
}

#[tokio::test]
async fn test_nine_char_answer_gets_one_strict_retry() {
    let h = Harness::new(ScriptedProvider::ok(&[
        "ninechars",
        "FINAL: Use a rolling boil.",
    ]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how hot?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: "FINAL: Use a rolling boil.".into()
        }
    );
    let requests = h.provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].system.as_deref().unwrap().contains("STRICT"));
}

#[tokio::test]
async fn test_short_retry_answer_is_kept_over_fallback() {
    let h = Harness::new(ScriptedProvider::ok(&["ninechars", "eightchr"]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how hot?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: "eightchr".into()
        }
    );
    assert_eq!(h.provider.requests().len(), 2);
}

#[tokio::test]
async fn test_ten_char_answer_is_not_retried() {
    let h = Harness::new(ScriptedProvider::ok(&["tencharsok"]));
    let sid = h.session("s1").await;

    let outcome = h.send(&sid, "how hot?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Answer {
            text: "tencharsok".into()
        }
    );
    assert_eq!(h.provider.requests().len(), 1);
}

#[tokio::test]
async fn test_finished_session_still_answers_questions() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Salted butter works fine."]));
    let sid = h.session("s1").await;
    for _ in 0..3 {
        h.send(&sid, "next").await.unwrap();
    }

    let outcome = h.send(&sid, "can I use salted butter?").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Answer { .. }));
    assert_eq!(h.step(&sid).await, 3);
}

#[tokio::test]
async fn test_drifted_step_is_clamped() {
    let h = Harness::new(ScriptedProvider::ok(&["FINAL: Butter it right away."]));
    let sid = h.session("s1").await;
    h.store
        .update_session(
            sid.clone(),
            stepchef::core::types::SessionUpdate {
                current_step: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.send(&sid, "when?").await.unwrap();
    let request = &h.provider.requests()[0];
    assert!(request.messages.last().unwrap().content.contains("Current step 3/3"));

    let turns = h.store.list_transcript(sid.clone()).await.unwrap();
    assert!(turns.iter().all(|t| t.step_id == 3));

    // Navigation from a drifted step finishes rather than advancing further.
    assert_eq!(h.send(&sid, "next").await.unwrap(), TurnOutcome::Finished);
}

#[tokio::test]
async fn test_missing_fields_are_rejected_without_side_effects() {
    let h = Harness::new(ScriptedProvider::ok(&[]));
    let sid = h.session("s1").await;

    let err = h
        .controller
        .handle_message(TurnInput {
            session_id: None,
            content: Some("next".into()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::MissingField("sessionId")));
    assert_eq!(err.status_code(), 400);

    let err = h
        .controller
        .handle_message(TurnInput {
            session_id: Some(sid.clone()),
            content: Some("   ".into()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::MissingField("content")));

    assert!(h.store.list_transcript(sid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let h = Harness::new(ScriptedProvider::ok(&[]));
    let err = h.send("nope", "next").await.unwrap_err();
    assert!(matches!(err, TurnError::SessionNotFound(ref id) if id == "nope"));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_unknown_recipe_is_not_found_and_nothing_logged() {
    let h = Harness::new(ScriptedProvider::ok(&[]));
    h.store
        .insert_session("s1".into(), "user-1".into(), "croissant".into())
        .await
        .unwrap();

    let err = h.send("s1", "why?").await.unwrap_err();
    assert!(matches!(err, TurnError::RecipeNotFound(ref id) if id == "croissant"));
    assert_eq!(err.status_code(), 404);
    assert!(h.store.list_transcript("s1".into()).await.unwrap().is_empty());
}
