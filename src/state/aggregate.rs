use crate::types::{NormalizedEvent, ToolResult, Turn};
use std::collections::HashMap;

/// Folds normalized events into display turns in a single pass.
///
/// Tool results are correlated by id across the whole history seen so far,
/// not only within the open turn, so a result delivered after a later user
/// message still lands on the request it answers. Results whose request was
/// never seen are kept as unmatched entries on the open assistant turn.
#[derive(Debug, Default)]
pub struct TurnAggregator {
    turns: Vec<Turn>,
    open_assistant: Option<usize>,
    requests_by_id: HashMap<String, (usize, usize)>,
}

impl TurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn finish(self) -> Vec<Turn> {
        self.turns
    }

    pub fn push(&mut self, event: NormalizedEvent) {
        match event {
            NormalizedEvent::UserText { content } => {
                let index = self.turns.len();
                self.turns.push(Turn::user(content, index));
                self.open_assistant = None;
            }
            NormalizedEvent::Reasoning { content } => {
                self.open_assistant_turn().push_reasoning(content);
            }
            NormalizedEvent::AssistantTextDelta { content } => {
                self.open_assistant_turn().push_text(&content);
            }
            NormalizedEvent::ToolInvocationRequest(request) => {
                let turn_index = self.open_assistant_index();
                let id = request.id.clone();
                let position = self.turns[turn_index].record_request(request);
                self.requests_by_id.insert(id, (turn_index, position));
            }
            NormalizedEvent::ToolInvocationResult(result) => self.push_result(result),
            NormalizedEvent::UsageStats(usage) => match self.open_assistant {
                Some(index) => self.turns[index].add_usage(&usage),
                None => tracing::debug!(?usage, "usage outside an assistant turn not displayed"),
            },
        }
    }

    fn push_result(&mut self, result: ToolResult) {
        if let Some(&(turn_index, position)) = self.requests_by_id.get(&result.id) {
            if self.open_assistant != Some(turn_index) {
                tracing::debug!(
                    id = %result.id,
                    turn = turn_index,
                    "tool result attached to an earlier turn"
                );
            }
            self.turns[turn_index].attach_result_at(position, &result);
            return;
        }

        tracing::debug!(id = %result.id, "tool result without a matching request");
        self.open_assistant_turn().record_unmatched_result(result);
    }

    fn open_assistant_index(&mut self) -> usize {
        match self.open_assistant {
            Some(index) => index,
            None => {
                let index = self.turns.len();
                self.turns.push(Turn::assistant(index));
                self.open_assistant = Some(index);
                index
            }
        }
    }

    fn open_assistant_turn(&mut self) -> &mut Turn {
        let index = self.open_assistant_index();
        &mut self.turns[index]
    }
}

/// Aggregates a finite event sequence into turns.
pub fn aggregate<I>(events: I) -> Vec<Turn>
where
    I: IntoIterator<Item = NormalizedEvent>,
{
    let mut aggregator = TurnAggregator::new();
    for event in events {
        aggregator.push(event);
    }
    aggregator.finish()
}
