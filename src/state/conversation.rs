use super::aggregate::aggregate;
use super::consumer::{consume, StreamUpdate};
use crate::api::{normalized_events, ApiClient, Normalizer};
use crate::error::{ExchangeError, TransportError};
use crate::runtime::mode::ModeControl;
use crate::types::{MemoryBlock, Turn};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The running session with one agent: the transcript plus whatever is
/// needed to extend it.
///
/// `send` takes `&mut self`, so at most one exchange can be in flight.
pub struct Conversation {
    client: Arc<ApiClient>,
    normalizer: Normalizer,
    mode: ModeControl,
    agent_id: String,
    conversation_id: Option<String>,
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(client: ApiClient, agent_id: impl Into<String>, mode: ModeControl) -> Self {
        Self {
            client: Arc::new(client),
            normalizer: Normalizer::default(),
            mode,
            agent_id: agent_id.into(),
            conversation_id: None,
            turns: Vec::new(),
        }
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }

    pub fn mode(&self) -> &ModeControl {
        &self.mode
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Switches to another agent. The transcript and conversation id belong
    /// to the previous agent and are dropped.
    pub fn set_agent(&mut self, agent_id: impl Into<String>) {
        self.agent_id = agent_id.into();
        self.conversation_id = None;
        self.turns.clear();
        tracing::info!(agent_id = %self.agent_id, "switched agent");
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn set_conversation_id(&mut self, conversation_id: Option<String>) {
        self.conversation_id = conversation_id;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Sends `text` and consumes the response into a finished assistant turn.
    ///
    /// The user turn stays in the transcript whatever the outcome. The
    /// assistant turn is appended only when the exchange completes.
    pub async fn send(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
        updates: Option<&mpsc::UnboundedSender<StreamUpdate>>,
    ) -> Result<&Turn, ExchangeError> {
        let user_index = self.turns.len();
        self.turns.push(Turn::user(text, user_index));
        let sequence_index = user_index + 1;

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(agent_id = %self.agent_id, "exchange cancelled before the stream opened");
                return Err(ExchangeError::Cancelled);
            }
            opened = self.client.stream_message(
                &self.agent_id,
                self.conversation_id.as_deref(),
                text,
            ) => opened?,
        };

        let events = normalized_events(bytes, self.normalizer.clone(), self.mode.clone());
        let turn = consume(events, cancel, sequence_index, updates).await?;
        self.turns.push(turn);

        let last = self.turns.len() - 1;
        Ok(&self.turns[last])
    }

    /// Replaces the transcript with the agent's stored history. Returns the
    /// number of turns rebuilt.
    ///
    /// Tool requests already in the transcript keep the decision they were
    /// shown with; only requests new to the transcript are decided under the
    /// current mode.
    pub async fn replay_history(&mut self, limit: usize) -> Result<usize, TransportError> {
        let raw = self
            .client
            .fetch_history(&self.agent_id, self.conversation_id.as_deref(), limit)
            .await?;
        let mode = self.mode.get();
        let events = raw
            .iter()
            .filter_map(|payload| self.normalizer.normalize(payload, mode));
        let mut turns = aggregate(events);
        keep_earlier_decisions(&self.turns, &mut turns);
        self.turns = turns;

        tracing::info!(
            agent_id = %self.agent_id,
            messages = raw.len(),
            turns = self.turns.len(),
            "history replayed"
        );
        Ok(self.turns.len())
    }

    pub async fn core_memory(&self) -> Result<Vec<MemoryBlock>, TransportError> {
        self.client.fetch_core_memory(&self.agent_id).await
    }

    /// Writes the transcript as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.turns)
            .context("failed to serialize transcript")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write transcript to {}", path.display()))?;
        Ok(())
    }
}

fn keep_earlier_decisions(previous: &[Turn], turns: &mut [Turn]) {
    let decided: HashMap<&str, (bool, Option<&String>)> = previous
        .iter()
        .flat_map(|turn| &turn.tool_invocations)
        .filter(|invocation| invocation.requested)
        .map(|invocation| {
            (
                invocation.id.as_str(),
                (invocation.allowed, invocation.block_reason.as_ref()),
            )
        })
        .collect();
    if decided.is_empty() {
        return;
    }

    for invocation in turns
        .iter_mut()
        .flat_map(|turn| turn.tool_invocations.iter_mut())
        .filter(|invocation| invocation.requested)
    {
        if let Some((allowed, block_reason)) = decided.get(invocation.id.as_str()) {
            invocation.allowed = *allowed;
            invocation.block_reason = block_reason.cloned();
        }
    }
}
