// src/cli/mod.rs — CLI definition (clap derive)

pub mod migrate;
pub mod recipes;
pub mod serve;
pub mod transcript;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stepchef",
    about = "Step-by-step recipe walkthrough assistant",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the recipes in the catalog
    Recipes,
    /// Print a session's transcript grouped by step
    Transcript {
        /// Session id
        session_id: String,
    },
    /// Run database migrations
    Migrate {
        /// Show applied migrations only
        #[arg(long)]
        status: bool,
        /// Undo the most recent migration
        #[arg(long)]
        rollback: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["stepchef", "serve", "--port", "9001"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(9001) }));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stepchef", "transcript", "abc", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        match cli.command {
            Commands::Transcript { session_id } => assert_eq!(session_id, "abc"),
            _ => panic!("expected transcript"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["stepchef"]).is_err());
    }
}
