//! History compaction by summarization.
//!
//! When a session grows past its prune trigger, the volatile part of the
//! conversation is summarized by the backend and replaced by that summary plus
//! as many of the most recent volatile messages as fit under the
//! after-prune threshold. Persistent messages are never touched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use parley_core::{Backend, Message, Result, Session};

use crate::tokens::TokenCounter;

/// Most recent volatile messages always kept, budget permitting or not.
pub const MIN_MESSAGES_KEPT: usize = 3;

/// Prefix of the summary message.
pub const SUMMARY_PREFIX: &str = "Summary of chat: ";

/// Instruction appended to the summarization request. Never retained.
pub const SUMMARY_INSTRUCTION: &str = "Write a short summary of what we've said so far that I can give you later if we were to continue this conversation. Do not add a preamble or postamble to this summary.";

/// Sampling temperature for summarization calls.
pub const SUMMARY_TEMPERATURE: f32 = 1.0;

/// What a successful compaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub messages_before: usize,
    pub messages_after: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    /// Volatile messages kept verbatim after the summary
    pub kept_recent: usize,
}

impl CompactionReport {
    /// Messages folded into the summary.
    pub fn summarized(&self) -> usize {
        self.messages_before + 1 - self.messages_after
    }
}

/// Result of the compaction step that follows an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Length stayed within the prune trigger
    NotNeeded,
    /// History was summarized
    Compacted(CompactionReport),
    /// Summarization failed; messages were left unchanged
    Failed(String),
}

impl CompactionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CompactionOutcome::Failed(_))
    }
}

/// Number of trailing volatile messages to keep.
///
/// Walks `volatile_costs` from newest to oldest, admitting each message while
/// `base + admitted + cost < threshold`, then applies the
/// [`MIN_MESSAGES_KEPT`] floor.
pub fn suffix_len(volatile_costs: &[usize], base: usize, threshold: usize) -> usize {
    let mut admitted = 0;
    let mut admitted_tokens = 0;
    for cost in volatile_costs.iter().rev() {
        if base + admitted_tokens + cost >= threshold {
            break;
        }
        admitted_tokens += cost;
        admitted += 1;
    }
    admitted.max(MIN_MESSAGES_KEPT.min(volatile_costs.len()))
}

/// Runs the summarization protocol against a backend.
pub struct Compactor {
    counter: TokenCounter,
    backend: Arc<dyn Backend>,
}

impl Compactor {
    pub fn new(counter: TokenCounter, backend: Arc<dyn Backend>) -> Self {
        Self { counter, backend }
    }

    /// Whether a session of `length` tokens is over its prune trigger.
    pub fn needs_compaction(session: &Session, length: usize) -> bool {
        length > session.prune_trigger
    }

    /// Summarize the volatile history of `session`.
    ///
    /// Messages are only replaced once every step has succeeded; on error the
    /// session is left exactly as it was.
    pub async fn compact(&self, session: &mut Session) -> Result<CompactionReport> {
        let model = session.model.clone();
        let messages_before = session.messages.len();
        let tokens_before = self.counter.length(&model, session.messages())?;

        let (durable, volatile): (Vec<Message>, Vec<Message>) =
            session.messages.iter().cloned().partition(|m| m.persist);

        info!(
            messages = messages_before,
            tokens = tokens_before,
            durable = durable.len(),
            "Compacting session history"
        );

        let mut request = volatile.clone();
        request.push(Message::user(SUMMARY_INSTRUCTION));
        let text = self
            .backend
            .generate(&request, &model, SUMMARY_TEMPERATURE)
            .await?;
        let summary = Message::assistant(format!("{}{}", SUMMARY_PREFIX, text.trim()));

        let base = self.counter.length(&model, &durable)? + self.counter.cost(&model, &summary.content)?;
        let costs = volatile
            .iter()
            .map(|m| self.counter.cost(&model, &m.content))
            .collect::<Result<Vec<_>>>()?;
        let keep = suffix_len(&costs, base, session.after_prune_threshold);
        debug!(base, keep, volatile = volatile.len(), "Selected recent messages to keep");

        let mut compacted = durable;
        compacted.push(summary);
        compacted.extend(volatile.into_iter().skip(costs.len() - keep));

        let tokens_after = self.counter.length(&model, &compacted)?;
        session.messages.replace(compacted);

        let report = CompactionReport {
            messages_before,
            messages_after: session.messages.len(),
            tokens_before,
            tokens_after,
            kept_recent: keep,
        };
        info!(
            tokens_before = report.tokens_before,
            tokens_after = report.tokens_after,
            "Compaction complete"
        );
        Ok(report)
    }
}
