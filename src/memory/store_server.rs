// src/memory/store_server.rs — Async message passing for Store
//
// The SQLite connection lives on one background task; request handlers talk
// to it through a cloneable `StoreHandle`. Commands are processed one at a
// time, in arrival order.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::core::ports::{SessionStore, TurnStore};
use crate::core::types::{NewTurn, Session, SessionUpdate, Turn};
use crate::memory::store::{ConsentedSessionRow, DemographicsRow, Store};

type Reply<T> = oneshot::Sender<anyhow::Result<T>>;

#[derive(Debug)]
pub enum StoreCommand {
    InsertSession {
        id: String,
        user_id: String,
        recipe_id: String,
        resp: Reply<Session>,
    },
    GetSession {
        id: String,
        resp: Reply<Option<Session>>,
    },
    UpdateSession {
        id: String,
        update: SessionUpdate,
        resp: Reply<bool>,
    },
    AppendTurn {
        turn: NewTurn,
        resp: Reply<Turn>,
    },
    ListTurns {
        session_id: String,
        step_id: Option<u32>,
        resp: Reply<Vec<Turn>>,
    },
    ListTranscript {
        session_id: String,
        resp: Reply<Vec<Turn>>,
    },
    UpsertDemographics {
        row: DemographicsRow,
        resp: Reply<()>,
    },
    GetDemographics {
        user_id: String,
        resp: Reply<Option<DemographicsRow>>,
    },
    QueryConsentedSessions {
        since_ms: Option<i64>,
        limit: u32,
        resp: Reply<Vec<ConsentedSessionRow>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx.send(build(resp_tx)).await?;
        resp_rx.await?
    }

    pub async fn insert_session(
        &self,
        id: String,
        user_id: String,
        recipe_id: String,
    ) -> anyhow::Result<Session> {
        self.request(|resp| StoreCommand::InsertSession {
            id,
            user_id,
            recipe_id,
            resp,
        })
        .await
    }

    pub async fn get_session(&self, id: String) -> anyhow::Result<Option<Session>> {
        self.request(|resp| StoreCommand::GetSession { id, resp })
            .await
    }

    pub async fn update_session(&self, id: String, update: SessionUpdate) -> anyhow::Result<bool> {
        self.request(|resp| StoreCommand::UpdateSession { id, update, resp })
            .await
    }

    pub async fn append_turn(&self, turn: NewTurn) -> anyhow::Result<Turn> {
        self.request(|resp| StoreCommand::AppendTurn { turn, resp })
            .await
    }

    pub async fn list_turns(
        &self,
        session_id: String,
        step_id: Option<u32>,
    ) -> anyhow::Result<Vec<Turn>> {
        self.request(|resp| StoreCommand::ListTurns {
            session_id,
            step_id,
            resp,
        })
        .await
    }

    pub async fn list_transcript(&self, session_id: String) -> anyhow::Result<Vec<Turn>> {
        self.request(|resp| StoreCommand::ListTranscript { session_id, resp })
            .await
    }

    pub async fn upsert_demographics(&self, row: DemographicsRow) -> anyhow::Result<()> {
        self.request(|resp| StoreCommand::UpsertDemographics { row, resp })
            .await
    }

    pub async fn get_demographics(&self, user_id: String) -> anyhow::Result<Option<DemographicsRow>> {
        self.request(|resp| StoreCommand::GetDemographics { user_id, resp })
            .await
    }

    pub async fn query_consented_sessions(
        &self,
        since_ms: Option<i64>,
        limit: u32,
    ) -> anyhow::Result<Vec<ConsentedSessionRow>> {
        self.request(|resp| StoreCommand::QueryConsentedSessions {
            since_ms,
            limit,
            resp,
        })
        .await
    }
}

#[async_trait]
impl SessionStore for StoreHandle {
    async fn get_session(&self, id: &str) -> anyhow::Result<Option<Session>> {
        StoreHandle::get_session(self, id.to_string()).await
    }

    async fn update_session(&self, id: &str, update: SessionUpdate) -> anyhow::Result<bool> {
        StoreHandle::update_session(self, id.to_string(), update).await
    }
}

#[async_trait]
impl TurnStore for StoreHandle {
    async fn append_turn(&self, turn: NewTurn) -> anyhow::Result<Turn> {
        StoreHandle::append_turn(self, turn).await
    }

    async fn list_turns(&self, session_id: &str, step_id: Option<u32>) -> anyhow::Result<Vec<Turn>> {
        StoreHandle::list_turns(self, session_id.to_string(), step_id).await
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::InsertSession {
                id,
                user_id,
                recipe_id,
                resp,
            } => {
                let res = store.insert_session(&id, &user_id, &recipe_id);
                let _ = resp.send(res);
            }
            StoreCommand::GetSession { id, resp } => {
                let _ = resp.send(store.get_session(&id));
            }
            StoreCommand::UpdateSession { id, update, resp } => {
                let _ = resp.send(store.update_session(&id, &update));
            }
            StoreCommand::AppendTurn { turn, resp } => {
                let _ = resp.send(store.append_turn(&turn));
            }
            StoreCommand::ListTurns {
                session_id,
                step_id,
                resp,
            } => {
                let _ = resp.send(store.list_turns(&session_id, step_id));
            }
            StoreCommand::ListTranscript { session_id, resp } => {
                let _ = resp.send(store.list_transcript(&session_id));
            }
            StoreCommand::UpsertDemographics { row, resp } => {
                let _ = resp.send(store.upsert_demographics(&row));
            }
            StoreCommand::GetDemographics { user_id, resp } => {
                let _ = resp.send(store.get_demographics(&user_id));
            }
            StoreCommand::QueryConsentedSessions {
                since_ms,
                limit,
                resp,
            } => {
                let _ = resp.send(store.query_consented_sessions(since_ms, limit));
            }
        }
    }
    tracing::debug!("Store server stopped: all handles dropped");
}
