//! Interactive mode.
//!
//! A readline-style REPL with persisted input history and slash commands.
//! Plain input is sent to the model as a conversational turn.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use parley_core::error::format_error_with_suggestion;
use parley_core::{Config, Session};
use parley_providers::ProviderBackend;
use parley_session::{AppendOutcome, CompactionOutcome, SessionController, SessionStore};

use crate::{AppContext, Cli};

mod commands;

/// Run the interactive REPL.
pub async fn run(cli: Cli, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let backend = ProviderBackend::from_config(&ctx.config, ctx.models.clone());
    if backend.providers().is_empty() {
        tracing::warn!("No provider configured. Set OPENAI_API_KEY or providers.openai.api_key.");
    }

    let session = initial_session(&cli, &ctx).await?;
    let resumed = session.filename.is_some();
    let mut controller = SessionController::new(
        session,
        ctx.models.clone(),
        Arc::new(backend),
        ctx.store.clone(),
    )?
    .with_temperature(ctx.config.general.temperature);

    print_welcome_banner(&controller, resumed);

    // Initialize readline editor
    let mut editor = DefaultEditor::new()?;

    // Load history if it exists
    let history_path = get_history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
    }

    // Main REPL loop
    loop {
        match editor.readline("You: ") {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = editor.add_history_entry(line);

                if line.starts_with('/') {
                    match commands::handle_command(line, &mut controller).await {
                        commands::CommandResult::Continue => continue,
                        commands::CommandResult::Exit => break,
                        commands::CommandResult::Error(e) => {
                            eprintln!("Error: {}", e);
                            continue;
                        }
                    }
                }

                match controller.respond(line).await {
                    Ok(turn) => {
                        report_compaction(&turn.user);
                        println!("\nassistant: {}\n", turn.reply);
                        report_compaction(&turn.assistant);
                    }
                    Err(e) => eprintln!("Error: {}", format_error_with_suggestion(&e)),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history
    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&history_path);

    Ok(())
}

/// Fresh session from config, or a saved one when `-c`/`-r` was given.
async fn initial_session(cli: &Cli, ctx: &AppContext) -> anyhow::Result<Session> {
    if let Some(ref filename) = cli.resume {
        let path = ctx.store.find(filename).await?;
        return ctx
            .store
            .load(&path)
            .await
            .with_context(|| format!("Failed to resume {}", path.display()));
    }

    if cli.r#continue {
        match ctx.store.most_recent().await? {
            Some(summary) => return Ok(ctx.store.load(&summary.path).await?),
            None => println!("No saved sessions found. Starting a new one."),
        }
    }

    let config = &ctx.config;
    Ok(Session::new(config.general.model.clone())
        .with_budget(config.session.prune_trigger, config.session.after_prune_threshold))
}

fn print_welcome_banner(controller: &SessionController, resumed: bool) {
    let session = controller.session();
    if resumed {
        println!(
            "Resumed '{}' ({} messages).",
            session.display_title(),
            session.messages.len()
        );
    }
    println!(
        "You are now talking to the {} model. Enter '/exit' to end the conversation, '/help' for commands.\n",
        session.model
    );
}

/// Print a notice when an append triggered compaction.
pub(crate) fn report_compaction(outcome: &AppendOutcome) {
    match &outcome.compaction {
        CompactionOutcome::NotNeeded => {}
        CompactionOutcome::Compacted(report) => println!(
            "[Summarized {} messages: {} -> {} tokens]",
            report.summarized(),
            report.tokens_before,
            report.tokens_after
        ),
        CompactionOutcome::Failed(reason) => {
            println!("[Failed to compact history, keeping it whole: {}]", reason)
        }
    }
}

/// Get the path to the history file.
fn get_history_path() -> PathBuf {
    Config::data_dir().join("history.txt")
}
