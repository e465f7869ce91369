// src/api/handlers.rs

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use regex::Regex;
use std::sync::LazyLock;

use crate::api::{auth, types::*, ApiState};
use crate::core::controller::TurnError;
use crate::core::types::{TurnInput, TurnOutcome};
use crate::memory::DemographicsRow;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Most rows returned by the consent listing.
const CONSENTED_LIMIT: u32 = 500;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!("Request failed: {e:#}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn required(value: Option<String>, what: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("{what} required")))
}

/// POST /api/session — Start a walkthrough at step 1.
pub async fn create_session(
    State(state): State<ApiState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let recipe_id = required(body.recipe_id, "recipeId")?;
    if state.catalog.get(&recipe_id).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("recipe '{recipe_id}' not found"),
        ));
    }

    let user_id = body
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session_id = uuid::Uuid::new_v4().to_string();

    let session = state
        .store
        .insert_session(session_id, user_id, recipe_id)
        .await
        .map_err(internal)?;

    tracing::info!(session = %session.id, recipe = %session.recipe_id, "Session started");

    Ok(Json(CreateSessionResponse {
        session_id: session.id,
        user_id: session.user_id,
        current_step: 1,
    }))
}

/// GET /api/session?id= — Raw session record.
pub async fn get_session(
    State(state): State<ApiState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = required(query.id, "id")?;
    let session = state
        .store
        .get_session(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "session not found"))?;
    Ok(Json(SessionResponse { session }))
}

/// POST /api/message — One user utterance through the turn controller.
pub async fn post_message(
    State(state): State<ApiState>,
    Json(body): Json<TurnInput>,
) -> Result<Json<TurnOutcome>, ApiError> {
    match state.controller.handle_message(body).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(TurnError::Internal(e)) => Err(internal(e)),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            Err(api_error(status, e.to_string()))
        }
    }
}

/// GET /api/step?sessionId= — Current step text plus this step's turns.
pub async fn get_step(
    State(state): State<ApiState>,
    Query(query): Query<SessionIdQuery>,
) -> Result<Json<StepView>, ApiError> {
    let session_id = required(query.session_id, "sessionId")?;
    let session = state
        .store
        .get_session(session_id.clone())
        .await
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "session not found"))?;
    let recipe = state
        .catalog
        .get(&session.recipe_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "recipe not found"))?;

    let step_num = recipe.clamp_step(session.current_step);
    let turns = state
        .store
        .list_turns(session_id, Some(step_num))
        .await
        .map_err(internal)?;

    Ok(Json(StepView {
        title: recipe.title.clone(),
        step_num,
        total: recipe.total_steps(),
        text: recipe.step_text(step_num).to_string(),
        turns: turns
            .into_iter()
            .map(|t| StepTurn {
                role: t.role,
                text: t.text,
                created_at: t.created_at.timestamp_millis(),
            })
            .collect(),
    }))
}

/// GET /api/transcript?sessionId= — Full transcript for review.
pub async fn get_transcript(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<SessionIdQuery>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let session_id = required(query.session_id, "sessionId")?;
    let session = state
        .store
        .get_session(session_id.clone())
        .await
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "session not found"))?;
    let turns = state
        .store
        .list_transcript(session_id)
        .await
        .map_err(internal)?;

    // A recipe removed from the catalog still leaves a readable transcript.
    let recipe = state.catalog.get(&session.recipe_id);
    let step_text = |step: u32| -> String {
        recipe
            .and_then(|r| r.steps.get(step as usize - 1))
            .cloned()
            .unwrap_or_default()
    };

    Ok(Json(TranscriptResponse {
        recipe: TranscriptRecipe {
            title: recipe
                .map(|r| r.title.clone())
                .unwrap_or_else(|| session.recipe_id.clone()),
            total: recipe.map(|r| r.steps.len() as u32).unwrap_or(0),
        },
        turns: turns
            .into_iter()
            .map(|t| TranscriptTurn {
                step_id: t.step_id,
                step_text: step_text(t.step_id.max(1)),
                role: t.role,
                text: t.text,
                at: t.created_at.timestamp_millis(),
            })
            .collect(),
        session: TranscriptSession {
            id: session.id,
            user_id: session.user_id,
            recipe_id: session.recipe_id,
            started_at: session.started_at.timestamp_millis(),
            ended_at: session.ended_at.map(|t| t.timestamp_millis()),
        },
    }))
}

/// POST /api/demographics — Store (or replace) a user's survey answers.
pub async fn post_demographics(
    State(state): State<ApiState>,
    Json(body): Json<DemographicsRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let user_id = required(body.user_id, "userId")?;

    let row = DemographicsRow {
        user_id,
        gender: body.gender,
        age: body.age.as_ref().and_then(serde_json::Value::as_i64),
        cook_interest: body.cook_interest.as_ref().and_then(serde_json::Value::as_i64),
        experience: body.experience,
        other: body.other,
        consent: body.consent.as_ref().is_some_and(truthy),
    };

    state
        .store
        .upsert_demographics(row)
        .await
        .map_err(internal)?;

    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/consented?since=24h — Sessions whose users consented, newest first.
pub async fn list_consented(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<SinceQuery>,
) -> Result<Json<ConsentedResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let now_ms = chrono::Utc::now().timestamp_millis();
    let since_ms = query
        .since
        .as_deref()
        .and_then(|s| parse_since(s, now_ms));

    let items = state
        .store
        .query_consented_sessions(since_ms, CONSENTED_LIMIT)
        .await
        .map_err(internal)?;

    Ok(Json(ConsentedResponse { ok: true, items }))
}

/// GET /api/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

static SINCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([hdw])$").expect("valid since regex"));

/// "24h" / "7d" / "2w" relative to `now_ms`. Anything else, including a span
/// too large to represent, is `None`.
pub fn parse_since(since: &str, now_ms: i64) -> Option<i64> {
    let caps = SINCE.captures(since.trim())?;
    let count: i64 = caps[1].parse().ok()?;
    let hour_ms: i64 = 60 * 60 * 1000;
    let unit_ms = match caps[2].to_ascii_lowercase().as_str() {
        "h" => hour_ms,
        "d" => 24 * hour_ms,
        "w" => 7 * 24 * hour_ms,
        _ => return None,
    };
    now_ms.checked_sub(count.checked_mul(unit_ms)?)
}

/// JavaScript-style truthiness for the consent flag.
fn truthy(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
