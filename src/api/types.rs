// src/api/types.rs — Request and response bodies (camelCase on the wire)

use serde::{Deserialize, Serialize};

use crate::core::types::{Session, TurnRole};
use crate::memory::ConsentedSessionRow;

/// Body for creating a session. `userId` is minted when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub recipe_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub user_id: String,
    pub current_step: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    pub since: Option<String>,
}

/// The current step of a session and its conversation so far.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub title: String,
    pub step_num: u32,
    pub total: u32,
    pub text: String,
    pub turns: Vec<StepTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTurn {
    pub role: TurnRole,
    pub text: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session: TranscriptSession,
    pub recipe: TranscriptRecipe,
    pub turns: Vec<TranscriptTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSession {
    pub id: String,
    pub user_id: String,
    pub recipe_id: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptRecipe {
    pub title: String,
    pub total: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptTurn {
    pub step_id: u32,
    pub step_text: String,
    pub role: TurnRole,
    pub text: String,
    pub at: i64,
}

/// Survey submission. Non-numeric `age`/`cookInterest` are stored as null;
/// `consent` is coerced to a boolean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<serde_json::Value>,
    #[serde(default)]
    pub cook_interest: Option<serde_json::Value>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub other: Option<String>,
    #[serde(default)]
    pub consent: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsentedResponse {
    pub ok: bool,
    pub items: Vec<ConsentedSessionRow>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
