//! Saved session commands.

use chrono::{DateTime, Local, Utc};

use parley_session::{SessionStore, SessionSummary};

use crate::{AppContext, SessionsAction};

/// Format a datetime for display.
fn format_time(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Format a session summary for display.
pub fn format_session_summary(s: &SessionSummary) -> String {
    format!(
        "{:<10} {} [{}] {} ({} msgs)",
        s.filename,
        s.title,
        s.model,
        format_time(&s.updated_at),
        s.message_count
    )
}

pub async fn handle(action: SessionsAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        SessionsAction::List { limit } => {
            let sessions = ctx.store.list().await?;
            if sessions.is_empty() {
                println!("No saved sessions in {}", ctx.store.dir().display());
                return Ok(());
            }
            for summary in sessions.iter().take(limit) {
                println!("{}", format_session_summary(summary));
            }
            if sessions.len() > limit {
                println!("... and {} more", sessions.len() - limit);
            }
        }
    }
    Ok(())
}
