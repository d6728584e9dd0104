use serde::{Deserialize, Serialize};

/// One unit of agent-stream output after normalization.
///
/// Every component downstream of the normalizer works only with this enum;
/// raw payload shapes never leak past `api::normalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedEvent {
    UserText { content: String },
    Reasoning { content: String },
    AssistantTextDelta { content: String },
    ToolInvocationRequest(ToolRequest),
    ToolInvocationResult(ToolResult),
    UsageStats(UsageStats),
}

impl NormalizedEvent {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self::UserText {
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::AssistantTextDelta {
            content: content.into(),
        }
    }

    /// True for the variants that belong to an assistant turn.
    pub fn is_assistant_side(&self) -> bool {
        matches!(
            self,
            Self::Reasoning { .. }
                | Self::AssistantTextDelta { .. }
                | Self::ToolInvocationRequest(_)
                | Self::ToolInvocationResult(_)
        )
    }
}

/// A tool call the agent wants to perform, with the policy decision that was
/// made when it was normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub status: ToolStatus,
    pub result_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl UsageStats {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }

    /// Adds `other` into `self`. A field stays `None` only when both sides
    /// are `None`.
    pub fn accumulate(&mut self, other: &UsageStats) {
        fn add(lhs: Option<u64>, rhs: Option<u64>) -> Option<u64> {
            match (lhs, rhs) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
            }
        }
        self.input_tokens = add(self.input_tokens, other.input_tokens);
        self.output_tokens = add(self.output_tokens, other.output_tokens);
        self.total_tokens = add(self.total_tokens, other.total_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = NormalizedEvent::assistant_text("Hi");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "assistant_text_delta");
        assert_eq!(value["content"], "Hi");
    }

    #[test]
    fn test_usage_accumulate_keeps_none_when_both_missing() {
        let mut usage = UsageStats {
            input_tokens: Some(10),
            ..UsageStats::default()
        };
        usage.accumulate(&UsageStats {
            input_tokens: Some(5),
            output_tokens: Some(3),
            total_tokens: None,
        });
        assert_eq!(usage.input_tokens, Some(15));
        assert_eq!(usage.output_tokens, Some(3));
        assert_eq!(usage.total_tokens, None);
    }

    #[test]
    fn test_assistant_side_excludes_user_and_usage() {
        assert!(!NormalizedEvent::user_text("x").is_assistant_side());
        assert!(!NormalizedEvent::UsageStats(UsageStats::default()).is_assistant_side());
        assert!(NormalizedEvent::reasoning("x").is_assistant_side());
    }
}
