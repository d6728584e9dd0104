use super::event::{ToolRequest, ToolResult, ToolStatus, UsageStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub result_text: String,
}

/// A tool request, optionally paired with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutcome>,
    /// `false` when the entry was created from a result whose request was
    /// never seen.
    pub requested: bool,
}

impl ToolInvocation {
    pub fn from_request(request: ToolRequest) -> Self {
        Self {
            id: request.id,
            name: request.name,
            arguments: request.arguments,
            allowed: request.allowed,
            block_reason: request.block_reason,
            result: None,
            requested: true,
        }
    }

    pub fn from_unmatched_result(result: ToolResult) -> Self {
        Self {
            id: result.id,
            name: result.name,
            arguments: serde_json::Value::Object(serde_json::Map::new()),
            allowed: true,
            block_reason: None,
            result: Some(ToolOutcome {
                status: result.status,
                result_text: result.result_text,
            }),
            requested: false,
        }
    }

    fn apply_result(&mut self, result: &ToolResult) {
        if self.name.is_empty() {
            self.name = result.name.clone();
        }
        self.result = Some(ToolOutcome {
            status: result.status,
            result_text: result.result_text.clone(),
        });
    }
}

/// One grouped unit of display output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub reasoning: Vec<String>,
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
    pub sequence_index: usize,
}

impl Turn {
    pub fn user(content: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: Vec::new(),
            tool_invocations: Vec::new(),
            usage: None,
            sequence_index,
        }
    }

    pub fn assistant(sequence_index: usize) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            reasoning: Vec::new(),
            tool_invocations: Vec::new(),
            usage: None,
            sequence_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty() && self.tool_invocations.is_empty()
    }

    pub fn invocation(&self, id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations.iter().rev().find(|inv| inv.id == id)
    }

    pub(crate) fn push_text(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub(crate) fn push_reasoning(&mut self, content: String) {
        self.reasoning.push(content);
    }

    pub(crate) fn add_usage(&mut self, usage: &UsageStats) {
        self.usage.get_or_insert_with(UsageStats::default).accumulate(usage);
    }

    /// Records a request and returns its position in `tool_invocations`.
    ///
    /// A request whose id is already present (and was itself requested)
    /// updates that entry in place; an earlier result stays attached.
    pub(crate) fn record_request(&mut self, request: ToolRequest) -> usize {
        if let Some(position) = self
            .tool_invocations
            .iter()
            .rposition(|inv| inv.requested && inv.id == request.id)
        {
            let existing = &mut self.tool_invocations[position];
            if !request.name.is_empty() {
                existing.name = request.name;
            }
            existing.arguments = request.arguments;
            existing.allowed = request.allowed;
            existing.block_reason = request.block_reason;
            return position;
        }

        self.tool_invocations
            .push(ToolInvocation::from_request(request));
        self.tool_invocations.len() - 1
    }

    /// Attaches `result` to the most recent requested invocation with the
    /// same id. Returns `false` when there is none in this turn.
    pub(crate) fn attach_result(&mut self, result: &ToolResult) -> bool {
        match self
            .tool_invocations
            .iter()
            .rposition(|inv| inv.requested && inv.id == result.id)
        {
            Some(position) => {
                self.attach_result_at(position, result);
                true
            }
            None => false,
        }
    }

    pub(crate) fn attach_result_at(&mut self, position: usize, result: &ToolResult) {
        if let Some(invocation) = self.tool_invocations.get_mut(position) {
            invocation.apply_result(result);
        }
    }

    pub(crate) fn record_unmatched_result(&mut self, result: ToolResult) -> usize {
        self.tool_invocations
            .push(ToolInvocation::from_unmatched_result(result));
        self.tool_invocations.len() - 1
    }
}
