// src/core/controller.rs — One inbound message in, one outcome out
//
// Order per message: validate input, resolve session, resolve recipe, persist
// the user turn, then either move the session along or answer the question.
// Answering-service failures never escape; they become a fallback answer.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::classifier::{expand_question, is_navigation, resolve_need};
use super::envelope::{conversation_window, PromptEnvelope, StepContext};
use super::extract::extract_final;
use super::ports::{RecipeCatalog, SessionStore, TurnStore};
use super::types::{NewTurn, Session, SessionUpdate, TurnInput, TurnOutcome};
use crate::infra::config::AnsweringConfig;
use crate::infra::errors::StepChefError;
use crate::provider::ModelProvider;
use crate::recipe::Recipe;

/// Answers shorter than this trigger the strict retry.
pub const RETRY_BELOW_CHARS: usize = 10;

/// Shown when the model answered but nothing usable could be extracted.
pub const NOT_SURE_FALLBACK: &str =
    "I'm not sure. Could you rephrase or ask about a smaller part of this step?";

/// Shown when the answering service itself failed.
pub const SERVICE_FAILURE_FALLBACK: &str =
    "I'm not sure about this step. Could you rephrase or ask about a smaller part?";

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("sessionId and content required (missing {0})")]
    MissingField(&'static str),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("recipe '{0}' not found")]
    RecipeNotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TurnError {
    /// HTTP-equivalent status for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            TurnError::MissingField(_) => 400,
            TurnError::SessionNotFound(_) | TurnError::RecipeNotFound(_) => 404,
            TurnError::Internal(_) => 500,
        }
    }
}

pub struct TurnController {
    sessions: Arc<dyn SessionStore>,
    turns: Arc<dyn TurnStore>,
    recipes: Arc<dyn RecipeCatalog>,
    provider: Arc<dyn ModelProvider>,
    answering: AnsweringConfig,
}

impl TurnController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        turns: Arc<dyn TurnStore>,
        recipes: Arc<dyn RecipeCatalog>,
        provider: Arc<dyn ModelProvider>,
        answering: AnsweringConfig,
    ) -> Self {
        Self {
            sessions,
            turns,
            recipes,
            provider,
            answering,
        }
    }

    pub async fn handle_message(&self, input: TurnInput) -> Result<TurnOutcome, TurnError> {
        let session_id = input
            .session_id
            .filter(|s| !s.trim().is_empty())
            .ok_or(TurnError::MissingField("sessionId"))?;
        let content = input
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(TurnError::MissingField("content"))?;

        let session = self
            .sessions
            .get_session(&session_id)
            .await?
            .ok_or_else(|| TurnError::SessionNotFound(session_id.clone()))?;

        let recipe = self
            .recipes
            .get_recipe(&session.recipe_id)
            .ok_or_else(|| TurnError::RecipeNotFound(session.recipe_id.clone()))?;

        let step = recipe.clamp_step(session.current_step);

        self.turns
            .append_turn(NewTurn::user(&session.id, step, content.clone()))
            .await?;

        if is_navigation(&content) {
            return self.navigate(&session, &recipe, step).await;
        }

        let answer = self.answer(&session, &recipe, step, &content).await?;

        self.turns
            .append_turn(NewTurn::agent(&session.id, step, answer.clone()))
            .await?;

        Ok(TurnOutcome::Answer { text: answer })
    }

    async fn navigate(
        &self,
        session: &Session,
        recipe: &Recipe,
        step: u32,
    ) -> Result<TurnOutcome, TurnError> {
        let total = recipe.total_steps();

        if session.is_finished() || step >= total {
            if !session.is_finished() {
                let ended = self
                    .sessions
                    .update_session(&session.id, SessionUpdate::end(Utc::now()))
                    .await?;
                info!(session = %session.id, ended, "Session finished");
            }
            return Ok(TurnOutcome::Finished);
        }

        let next = step + 1;
        let advanced = self
            .sessions
            .update_session(&session.id, SessionUpdate::advance(session.current_step, next))
            .await?;
        if !advanced {
            // Another request moved this session first; it is already past `step`.
            warn!(session = %session.id, from = step, "Concurrent step change; not advancing again");
        } else {
            debug!(session = %session.id, from = step, to = next, "Advanced step");
        }

        if next >= total {
            Ok(TurnOutcome::StepAdvanceLast)
        } else {
            Ok(TurnOutcome::StepAdvance)
        }
    }

    /// Build the envelope, ask once, retry once with the strict reminder if the
    /// answer is unusable. Only store failures are returned as errors.
    async fn answer(
        &self,
        session: &Session,
        recipe: &Recipe,
        step: u32,
        content: &str,
    ) -> Result<String, TurnError> {
        // Includes the user turn just stored for this message.
        let step_turns = self.turns.list_turns(&session.id, Some(step)).await?;
        let history = conversation_window(&step_turns);

        let step_text = recipe.step_text(step);
        let expanded = expand_question(content, step_text);
        let need = resolve_need(&expanded, content);

        let ctx = StepContext {
            title: &recipe.title,
            step_num: step,
            total_steps: recipe.total_steps(),
            step_text,
            need,
        };
        let envelope = PromptEnvelope::build(&ctx, history, &expanded);

        match self.ask_with_retry(&envelope).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Ok(NOT_SURE_FALLBACK.to_string()),
            Err(e) => {
                warn!(
                    session = %session.id,
                    error = %e,
                    retriable = e.is_retriable(),
                    "Answering service failed"
                );
                Ok(SERVICE_FAILURE_FALLBACK.to_string())
            }
        }
    }

    async fn ask_with_retry(
        &self,
        envelope: &PromptEnvelope,
    ) -> Result<Option<String>, StepChefError> {
        let first = self.ask(envelope).await?;
        let reply = extract_final(&first);

        let usable = reply
            .as_ref()
            .is_some_and(|r| r.chars().count() >= RETRY_BELOW_CHARS);
        if usable {
            return Ok(reply);
        }

        debug!("First answer unusable; retrying with strict format");
        let second = self.ask(&envelope.strict()).await?;
        Ok(extract_final(&second))
    }

    async fn ask(&self, envelope: &PromptEnvelope) -> Result<String, StepChefError> {
        let request = envelope.to_request(&self.answering);

        if self.answering.debug {
            info!(
                provider = self.provider.id(),
                model = %request.model,
                history = envelope.history.len(),
                user = %envelope.user_message,
                "Answering request"
            );
        } else {
            debug!(
                provider = self.provider.id(),
                model = %request.model,
                history = envelope.history.len(),
                "Answering request"
            );
        }

        let response = self.provider.chat(request).await?;

        let preview: String = response.content.chars().take(500).collect();
        if self.answering.debug {
            info!(raw = %preview, tokens = response.usage.total(), "Answering response");
        } else {
            debug!(raw = %preview, tokens = response.usage.total(), "Answering response");
        }

        Ok(response.content)
    }
}
