// src/memory/store.rs — SQLite operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::Path;

use super::schema;
use crate::core::types::{NewTurn, Session, SessionUpdate, Turn, TurnRole};

/// Low-level SQLite operations for users, sessions, turns and survey data.
///
/// Timestamps are epoch milliseconds. `now_ms` never goes backwards within
/// one `Store`, so turn order by `created_at` matches insertion order.
pub struct Store {
    conn: Connection,
    last_ms: Cell<i64>,
}

/// Survey answers. One row per user, replaced on resubmission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsRow {
    pub user_id: String,
    pub gender: Option<String>,
    pub age: Option<i64>,
    pub cook_interest: Option<i64>,
    pub experience: Option<String>,
    pub other: Option<String>,
    pub consent: bool,
}

/// A session whose user consented to review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentedSessionRow {
    pub session_id: String,
    pub user_id: String,
    pub recipe_id: String,
    pub started_at: i64,
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let ended_at: Option<i64> = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        recipe_id: row.get(2)?,
        current_step: row.get(3)?,
        started_at: from_ms(row.get(4)?),
        ended_at: ended_at.map(from_ms),
    })
}

fn turn_from_row(row: &Row<'_>) -> rusqlite::Result<Turn> {
    let role: String = row.get(2)?;
    let role = role.parse::<TurnRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role,
        step_id: row.get(3)?,
        text: row.get(4)?,
        created_at: from_ms(row.get(5)?),
    })
}

const SESSION_COLUMNS: &str = "id, user_id, recipe_id, current_step, started_at, ended_at";
const TURN_COLUMNS: &str = "id, session_id, role, step_id, text, created_at";

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            last_ms: Cell::new(0),
        }
    }

    /// Open (or create) the database at the given path and migrate it.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// In-memory database with schema applied (for testing).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn now_ms(&self) -> i64 {
        let ts = Utc::now().timestamp_millis().max(self.last_ms.get());
        self.last_ms.set(ts);
        ts
    }

    // -- Users --

    pub fn ensure_user(&self, id: &str) -> anyhow::Result<()> {
        let now = self.now_ms();
        self.conn.execute(
            "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
            params![id, now],
        )?;
        Ok(())
    }

    // -- Sessions --

    /// Create a session at step 1, creating the user if needed.
    pub fn insert_session(
        &self,
        id: &str,
        user_id: &str,
        recipe_id: &str,
    ) -> anyhow::Result<Session> {
        self.ensure_user(user_id)?;
        let now = self.now_ms();
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, recipe_id, current_step, started_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![id, user_id, recipe_id, now],
        )?;
        Ok(Session {
            id: id.to_string(),
            user_id: user_id.to_string(),
            recipe_id: recipe_id.to_string(),
            current_step: 1,
            started_at: from_ms(now),
            ended_at: None,
        })
    }

    pub fn get_session(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                [id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Apply a partial update. A step change is conditional on
    /// `expected_step` when given; `ended_at` is only ever written once.
    pub fn update_session(&self, id: &str, update: &SessionUpdate) -> anyhow::Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;

        if let Some(step) = update.current_step {
            changed += match update.expected_step {
                Some(expected) => tx.execute(
                    "UPDATE sessions SET current_step = ?1 WHERE id = ?2 AND current_step = ?3",
                    params![step, id, expected],
                )?,
                None => tx.execute(
                    "UPDATE sessions SET current_step = ?1 WHERE id = ?2",
                    params![step, id],
                )?,
            };
        }

        if let Some(ended_at) = update.ended_at {
            changed += tx.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
                params![ended_at.timestamp_millis(), id],
            )?;
        }

        tx.commit()?;
        Ok(changed > 0)
    }

    // -- Turns --

    pub fn append_turn(&self, turn: &NewTurn) -> anyhow::Result<Turn> {
        let now = self.now_ms();
        self.conn.execute(
            "INSERT INTO turns (session_id, role, step_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![turn.session_id, turn.role.as_str(), turn.step_id, turn.text, now],
        )?;
        Ok(Turn {
            id: self.conn.last_insert_rowid(),
            session_id: turn.session_id.clone(),
            role: turn.role,
            step_id: turn.step_id,
            text: turn.text.clone(),
            created_at: from_ms(now),
        })
    }

    /// Turns for a session, optionally restricted to one step, oldest first.
    pub fn list_turns(&self, session_id: &str, step_id: Option<u32>) -> anyhow::Result<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TURN_COLUMNS} FROM turns
             WHERE session_id = ?1 AND (?2 IS NULL OR step_id = ?2)
             ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id, step_id], turn_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every turn of a session grouped by step, then by time.
    pub fn list_transcript(&self, session_id: &str) -> anyhow::Result<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TURN_COLUMNS} FROM turns
             WHERE session_id = ?1
             ORDER BY step_id ASC, created_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map([session_id], turn_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Demographics --

    pub fn upsert_demographics(&self, d: &DemographicsRow) -> anyhow::Result<()> {
        self.ensure_user(&d.user_id)?;
        self.conn.execute(
            "INSERT INTO demographics (user_id, gender, age, cook_interest, experience, other, consent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
                gender = excluded.gender,
                age = excluded.age,
                cook_interest = excluded.cook_interest,
                experience = excluded.experience,
                other = excluded.other,
                consent = excluded.consent",
            params![
                d.user_id,
                d.gender,
                d.age,
                d.cook_interest,
                d.experience,
                d.other,
                d.consent
            ],
        )?;
        Ok(())
    }

    pub fn get_demographics(&self, user_id: &str) -> anyhow::Result<Option<DemographicsRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, gender, age, cook_interest, experience, other, consent
                 FROM demographics WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(DemographicsRow {
                        user_id: row.get(0)?,
                        gender: row.get(1)?,
                        age: row.get(2)?,
                        cook_interest: row.get(3)?,
                        experience: row.get(4)?,
                        other: row.get(5)?,
                        consent: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Sessions of consenting users, newest first.
    pub fn query_consented_sessions(
        &self,
        since_ms: Option<i64>,
        limit: u32,
    ) -> anyhow::Result<Vec<ConsentedSessionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.user_id, s.recipe_id, s.started_at
             FROM sessions s
             INNER JOIN demographics d ON d.user_id = s.user_id
             WHERE d.consent = 1 AND (?1 IS NULL OR s.started_at >= ?1)
             ORDER BY s.started_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![since_ms, limit], |row| {
                Ok(ConsentedSessionRow {
                    session_id: row.get(0)?,
                    user_id: row.get(1)?,
                    recipe_id: row.get(2)?,
                    started_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
