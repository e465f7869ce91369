// src/core/ports.rs — Collaborator interfaces the turn controller depends on

use async_trait::async_trait;

use super::types::{NewTurn, Session, SessionUpdate, Turn};
use crate::recipe::Recipe;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: &str) -> anyhow::Result<Option<Session>>;

    /// Apply a partial update. Returns false when nothing changed: the session
    /// is unknown, the expected step no longer matches, or `ended_at` was
    /// already set.
    async fn update_session(&self, id: &str, update: SessionUpdate) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait TurnStore: Send + Sync {
    async fn append_turn(&self, turn: NewTurn) -> anyhow::Result<Turn>;

    /// Turns for a session (optionally one step), oldest first.
    async fn list_turns(&self, session_id: &str, step_id: Option<u32>) -> anyhow::Result<Vec<Turn>>;
}

pub trait RecipeCatalog: Send + Sync {
    fn get_recipe(&self, id: &str) -> Option<Recipe>;
}
