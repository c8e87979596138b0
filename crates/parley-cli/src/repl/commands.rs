//! Slash command handling for the REPL.

use std::path::Path;

use parley_core::error::format_error_with_suggestion;
use parley_core::Message;
use parley_session::{SessionController, SessionStore};

use super::report_compaction;

/// Result of command execution.
pub enum CommandResult {
    /// Continue the REPL loop
    Continue,
    /// Exit the REPL
    Exit,
    /// An error occurred
    Error(String),
}

impl From<parley_core::Error> for CommandResult {
    fn from(e: parley_core::Error) -> Self {
        CommandResult::Error(format_error_with_suggestion(&e))
    }
}

/// Session selected by `/load`.
#[derive(Debug, PartialEq, Eq)]
enum LoadTarget<'a> {
    Index(usize),
    Filename(&'a str),
}

impl<'a> LoadTarget<'a> {
    fn parse(arg: &'a str) -> Self {
        match arg.parse() {
            Ok(index) => LoadTarget::Index(index),
            Err(_) => LoadTarget::Filename(arg),
        }
    }
}

/// Split `/cmd rest of line` into the command and its trimmed argument text.
fn split_command(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    }
}

/// Handle a slash command.
pub async fn handle_command(input: &str, controller: &mut SessionController) -> CommandResult {
    let (command, args) = split_command(input);

    let result = match command {
        "/help" | "/h" | "/?" => {
            print_help();
            Ok(CommandResult::Continue)
        }
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            Ok(CommandResult::Exit)
        }
        "/log" => print_log(controller),
        "/name" => rename(args, controller).await,
        "/load" => load(args, controller).await,
        "/clear" => controller.clear().await.map(|_| {
            println!("Log cleared.\n");
            CommandResult::Continue
        }),
        "/undo" => controller.undo().await.map(|removed| {
            if removed == 0 {
                println!("Nothing to undo.\n");
            } else {
                println!("Rewound to state of last message.\n");
            }
            CommandResult::Continue
        }),
        "/model" => model(args, controller).await,
        "/show" => seed_file(args, false, controller).await,
        "/pin" => seed_file(args, true, controller).await,
        "/status" => print_status(controller),
        _ => {
            println!("Invalid command.\n");
            Ok(CommandResult::Continue)
        }
    };

    result.unwrap_or_else(CommandResult::from)
}

/// Print help information.
fn print_help() {
    println!("Available commands:");
    println!();
    println!("  /help              Show this help message");
    println!("  /exit              Exit the REPL");
    println!("  /log               Show the conversation log and its token count");
    println!("  /name <title>      Rename the current session");
    println!("  /load              List saved sessions");
    println!("  /load <n|file>     Load a saved session by index or filename");
    println!("  /clear             Remove all messages from the session");
    println!("  /undo              Rewind to before your last message");
    println!("  /model             List available models");
    println!("  /model <name>      Switch to a different model");
    println!("  /show <path>       Add a file's contents to the conversation");
    println!("  /pin <path>        Add a file's contents, kept through summarization");
    println!("  /status            Show session status");
    println!();
    println!("Tips:");
    println!("  - Press Ctrl+D to exit");
    println!("  - Use Up/Down arrows for input history");
    println!("  - Start parley with -c to continue your last session");
    println!("  - Start parley with -r <file> to resume a specific session");
}

fn print_log(controller: &SessionController) -> parley_core::Result<CommandResult> {
    if !controller.messages().is_empty() {
        println!("{}", controller.transcript());
    }
    println!("Log contains {} tokens.\n", controller.length()?);
    Ok(CommandResult::Continue)
}

async fn rename(title: &str, controller: &mut SessionController) -> parley_core::Result<CommandResult> {
    if title.is_empty() {
        return Ok(CommandResult::Error("Usage: /name <title>".to_string()));
    }
    controller.rename(title).await?;
    println!("Renamed log to {}\n", title);
    Ok(CommandResult::Continue)
}

async fn load(arg: &str, controller: &mut SessionController) -> parley_core::Result<CommandResult> {
    let store = controller.store().clone();
    let sessions = store.list().await?;

    if arg.is_empty() {
        if sessions.is_empty() {
            println!("No saved sessions.\n");
            return Ok(CommandResult::Continue);
        }
        for (i, summary) in sessions.iter().enumerate() {
            println!("{}: {}", i, store.peek_title(&summary.path).await?);
        }
        println!("\nUse /load <n> to select a saved log.\n");
        return Ok(CommandResult::Continue);
    }

    let path = match LoadTarget::parse(arg) {
        LoadTarget::Index(i) => match sessions.get(i) {
            Some(summary) => summary.path.clone(),
            None => return Ok(CommandResult::Error("Invalid selection.".to_string())),
        },
        LoadTarget::Filename(name) => store.find(name).await?,
    };

    controller.load(&path).await?;
    println!("Loaded '{}'\n", controller.session().display_title());
    Ok(CommandResult::Continue)
}

async fn model(arg: &str, controller: &mut SessionController) -> parley_core::Result<CommandResult> {
    if arg.is_empty() {
        let current = controller.session().model.clone();
        println!("Available models:");
        for id in controller.models().models() {
            let marker = if id == current { "*" } else { " " };
            println!("  {} {}", marker, id);
        }
        println!();
        return Ok(CommandResult::Continue);
    }

    controller.set_model(arg).await?;
    println!("You are now talking to the {} model.\n", arg);
    Ok(CommandResult::Continue)
}

async fn seed_file(
    arg: &str,
    persist: bool,
    controller: &mut SessionController,
) -> parley_core::Result<CommandResult> {
    if arg.is_empty() {
        let usage = if persist { "Usage: /pin <path>" } else { "Usage: /show <path>" };
        return Ok(CommandResult::Error(usage.to_string()));
    }

    let path = Path::new(arg);
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            return Ok(CommandResult::Error(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let mut message = Message::user(format!("```\n{}\n```", contents.trim_end()));
    if persist {
        message = message.persistent();
    }

    let outcome = controller.append(message).await?;
    report_compaction(&outcome);
    println!(
        "Added {}{} to the conversation. Log contains {} tokens.\n",
        path.display(),
        if persist { " (pinned)" } else { "" },
        outcome.length
    );
    Ok(CommandResult::Continue)
}

fn print_status(controller: &SessionController) -> parley_core::Result<CommandResult> {
    let session = controller.session();
    println!("Session:     {}", session.display_title());
    println!(
        "File:        {}",
        session.filename.as_deref().unwrap_or("(not yet saved)")
    );
    println!("Model:       {}", session.model);
    println!("Temperature: {}", controller.temperature());
    println!(
        "Messages:    {} ({} pinned)",
        session.messages.len(),
        session.messages.iter().filter(|m| m.persist).count()
    );
    println!(
        "Tokens:      {} / {} (summarize down to {})",
        controller.length()?,
        session.prune_trigger,
        session.after_prune_threshold
    );
    println!();
    Ok(CommandResult::Continue)
}
