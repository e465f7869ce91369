// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::provider::Role;

/// One user's progression through one recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub recipe_id: String,
    /// As stored. May drift outside the recipe's range; clamp before use.
    pub current_step: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Partial session update. `expected_step` makes a step change conditional on
/// the stored value still being what the caller read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub expected_step: Option<i64>,
    pub current_step: Option<u32>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn advance(from: i64, to: u32) -> Self {
        Self {
            expected_step: Some(from),
            current_step: Some(to),
            ended_at: None,
        }
    }

    pub fn end(at: DateTime<Utc>) -> Self {
        Self {
            ended_at: Some(at),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Agent => "agent",
            TurnRole::System => "system",
        }
    }

    /// Role used when replaying the turn to the answering service.
    pub fn chat_role(&self) -> Role {
        match self {
            TurnRole::Agent => Role::Assistant,
            _ => Role::User,
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "agent" => Ok(TurnRole::Agent),
            "system" => Ok(TurnRole::System),
            other => Err(format!("unknown turn role '{other}'")),
        }
    }
}

/// A logged utterance. Append-only, ordered by `created_at` then `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: i64,
    pub session_id: String,
    pub role: TurnRole,
    pub step_id: u32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub session_id: String,
    pub role: TurnRole,
    pub step_id: u32,
    pub text: String,
}

impl NewTurn {
    pub fn user(session_id: &str, step_id: u32, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: TurnRole::User,
            step_id,
            text: text.into(),
        }
    }

    pub fn agent(session_id: &str, step_id: u32, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: TurnRole::Agent,
            step_id,
            text: text.into(),
        }
    }
}

/// Coarse intent behind a question, passed to the model as a framing hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Need {
    Task,
    Science,
    History,
}

impl Need {
    pub fn as_str(&self) -> &'static str {
        match self {
            Need::Task => "TASK",
            Need::Science => "SCIENCE",
            Need::History => "HISTORY",
        }
    }
}

impl fmt::Display for Need {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound message at the controller boundary. Fields are optional so that
/// missing input is reported by the controller rather than the decoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl TurnInput {
    pub fn new(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            content: Some(content.into()),
        }
    }
}

/// What one handled message produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TurnOutcome {
    Finished,
    StepAdvance,
    StepAdvanceLast,
    Answer { text: String },
}
