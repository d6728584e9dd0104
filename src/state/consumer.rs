use crate::error::{ExchangeError, TransportError};
use crate::types::{NormalizedEvent, ToolInvocation, Turn, UsageStats};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Progress of an exchange, sent while the assistant turn is still open.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// `delta` is the newly appended text, `content` the accumulated text.
    Delta {
        sequence_index: usize,
        delta: String,
        content: String,
    },
    Reasoning {
        sequence_index: usize,
        content: String,
    },
    ToolRequested {
        sequence_index: usize,
        invocation: ToolInvocation,
    },
    ToolCompleted {
        sequence_index: usize,
        invocation: ToolInvocation,
    },
    Usage {
        sequence_index: usize,
        usage: UsageStats,
    },
}

pub(crate) fn emit_stream_update(
    updates: Option<&mpsc::UnboundedSender<StreamUpdate>>,
    update: StreamUpdate,
) {
    if let Some(tx) = updates {
        let _ = tx.send(update);
    }
}

/// Drives one exchange to a finished assistant turn.
///
/// Cancellation is checked each time an event arrives, before it is applied.
/// A cancelled or failed exchange returns no turn; updates already sent are
/// not retracted.
pub async fn consume<S>(
    mut events: S,
    cancel: &CancellationToken,
    sequence_index: usize,
    updates: Option<&mpsc::UnboundedSender<StreamUpdate>>,
) -> Result<Turn, ExchangeError>
where
    S: Stream<Item = Result<NormalizedEvent, TransportError>> + Unpin,
{
    let mut turn = Turn::assistant(sequence_index);

    while let Some(item) = events.next().await {
        if cancel.is_cancelled() {
            tracing::info!(sequence_index, "exchange cancelled; partial turn discarded");
            return Err(ExchangeError::Cancelled);
        }

        let event = match item {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(sequence_index, %error, "exchange failed; partial turn discarded");
                return Err(ExchangeError::Transport(error));
            }
        };

        apply(&mut turn, event, updates);
    }

    if cancel.is_cancelled() {
        return Err(ExchangeError::Cancelled);
    }

    tracing::debug!(
        sequence_index,
        tools = turn.tool_invocations.len(),
        chars = turn.content.len(),
        "exchange complete"
    );
    Ok(turn)
}

fn apply(
    turn: &mut Turn,
    event: NormalizedEvent,
    updates: Option<&mpsc::UnboundedSender<StreamUpdate>>,
) {
    let sequence_index = turn.sequence_index;
    match event {
        NormalizedEvent::UserText { .. } => {
            tracing::trace!("ignoring user echo in exchange stream");
        }
        NormalizedEvent::Reasoning { content } => {
            turn.push_reasoning(content.clone());
            emit_stream_update(
                updates,
                StreamUpdate::Reasoning {
                    sequence_index,
                    content,
                },
            );
        }
        NormalizedEvent::AssistantTextDelta { content } => {
            turn.push_text(&content);
            emit_stream_update(
                updates,
                StreamUpdate::Delta {
                    sequence_index,
                    delta: content,
                    content: turn.content.clone(),
                },
            );
        }
        NormalizedEvent::ToolInvocationRequest(request) => {
            let position = turn.record_request(request);
            emit_stream_update(
                updates,
                StreamUpdate::ToolRequested {
                    sequence_index,
                    invocation: turn.tool_invocations[position].clone(),
                },
            );
        }
        NormalizedEvent::ToolInvocationResult(result) => {
            if !turn.attach_result(&result) {
                tracing::debug!(id = %result.id, "tool result without a matching request");
                turn.record_unmatched_result(result.clone());
            }
            if let Some(invocation) = turn.invocation(&result.id) {
                emit_stream_update(
                    updates,
                    StreamUpdate::ToolCompleted {
                        sequence_index,
                        invocation: invocation.clone(),
                    },
                );
            }
        }
        NormalizedEvent::UsageStats(usage) => {
            turn.add_usage(&usage);
            emit_stream_update(
                updates,
                StreamUpdate::Usage {
                    sequence_index,
                    usage,
                },
            );
        }
    }
}
