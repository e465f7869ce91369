// src/cli/serve.rs — Wire the store, catalog and provider into the API server

use std::sync::Arc;

use crate::api::{self, ApiState};
use crate::core::controller::TurnController;
use crate::core::ports::{RecipeCatalog, SessionStore, TurnStore};
use crate::infra::config::Config;
use crate::memory::{spawn_store_server, Store};
use crate::provider::openai::OpenAIProvider;
use crate::provider::ModelProvider;
use crate::recipe::Catalog;

pub async fn run_serve(config: &Config, catalog: Catalog, port: Option<u16>) -> anyhow::Result<()> {
    let api_key = config.answering.resolve_api_key()?;
    let provider: Arc<dyn ModelProvider> =
        Arc::new(OpenAIProvider::from_config(&config.answering, api_key));

    let db_path = config.storage.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Store::open(&db_path)?;
    tracing::info!("Database: {}", db_path.display());
    let (store_handle, _store_task) = spawn_store_server(store);

    let catalog = Arc::new(catalog);
    tracing::info!("Loaded {} recipes", catalog.len());

    let sessions: Arc<dyn SessionStore> = Arc::new(store_handle.clone());
    let turns: Arc<dyn TurnStore> = Arc::new(store_handle.clone());
    let recipes: Arc<dyn RecipeCatalog> = catalog.clone();
    let controller = TurnController::new(
        sessions,
        turns,
        recipes,
        provider,
        config.answering.clone(),
    );

    let state = ApiState {
        controller: Arc::new(controller),
        store: store_handle,
        catalog,
        token: config.server.token.clone(),
    };

    let mut server = config.server.clone();
    if let Some(port) = port {
        server.port = port;
    }
    api::start_server(&server, state).await
}
