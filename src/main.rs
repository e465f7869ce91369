// src/main.rs — StepChef entry point

use std::path::Path;

use clap::Parser;

use stepchef::cli::{Cli, Commands};
use stepchef::infra::config::Config;
use stepchef::infra::logger;
use stepchef::recipe::Catalog;

#[tokio::main]
async fn main() {
    // Respects STEPCHEF_LOG / RUST_LOG
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve { port } => {
            let catalog = load_catalog(&config)?;
            stepchef::cli::serve::run_serve(&config, catalog, port).await
        }
        Commands::Recipes => {
            let catalog = load_catalog(&config)?;
            stepchef::cli::recipes::list_recipes(&catalog);
            Ok(())
        }
        Commands::Transcript { session_id } => {
            let catalog = load_catalog(&config)?;
            let db_path = config.storage.resolved_db_path();
            stepchef::cli::transcript::show_transcript(&db_path, &catalog, &session_id).await
        }
        Commands::Migrate { status, rollback } => {
            let db_path = config.storage.resolved_db_path();
            stepchef::cli::migrate::run_migrate(&db_path, status, rollback).await
        }
    }
}

fn load_catalog(config: &Config) -> anyhow::Result<Catalog> {
    Catalog::load(config.recipes.path.as_deref().map(Path::new))
}
