//! # parley-cli
//!
//! Command-line interface for Parley.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parley_core::{Config, ModelRegistry};
use parley_session::FileSessionStore;

mod commands;
mod repl;

/// Application context containing shared state.
pub struct AppContext {
    pub config: Config,
    pub models: Arc<ModelRegistry>,
    pub store: Arc<FileSessionStore>,
}

/// Parley - talk to a language model within a fixed token budget
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model to use (e.g., gpt-3.5-turbo, gpt-4, text-davinci-003)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature for conversational turns
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Continue most recent session
    #[arg(short, long)]
    r#continue: bool,

    /// Resume specific session by filename
    #[arg(short, long, value_name = "FILENAME", conflicts_with = "continue")]
    resume: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Extra configuration file, layered above the project config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Saved session management
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved sessions, most recent first
    List {
        /// Maximum sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load API keys from a .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let mut config = Config::load_validated(cli.config.as_deref())?;
    if let Some(ref model) = cli.model {
        config.general.model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.general.temperature = temperature;
    }

    let store = Arc::new(FileSessionStore::new(config.session_dir()));
    let ctx = Arc::new(AppContext {
        config,
        models: Arc::new(ModelRegistry::builtin()),
        store,
    });

    // Handle subcommands
    match cli.command {
        Some(Commands::Sessions { action }) => {
            commands::session::handle(action, &ctx).await?;
        }
        Some(Commands::Config { action }) => {
            commands::config::handle(action, &ctx)?;
        }
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            repl::run(cli, ctx).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "parley",
            "--model",
            "gpt-4",
            "-t",
            "0.2",
            "-r",
            "log_3",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.model.as_deref(), Some("gpt-4"));
        assert_eq!(cli.temperature, Some(0.2));
        assert_eq!(cli.resume.as_deref(), Some("log_3"));
        assert!(cli.verbose);
        assert!(!cli.r#continue);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_continue_conflicts_with_resume() {
        assert!(Cli::try_parse_from(["parley", "-c", "-r", "log_0"]).is_err());
    }

    #[test]
    fn test_sessions_list_subcommand() {
        let cli = Cli::try_parse_from(["parley", "sessions", "list", "--limit", "5"]).unwrap();
        match cli.command {
            Some(Commands::Sessions {
                action: SessionsAction::List { limit },
            }) => assert_eq!(limit, 5),
            _ => panic!("expected sessions list"),
        }
    }
}
