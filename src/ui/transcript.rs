//! Plain-text rendering of turns. Styling is a tag on each line; the
//! terminal front end maps tags to colors.

use super::text::{display_width, truncate_to_display_width, wrap_lines};
use crate::error::ExchangeError;
use crate::types::{MemoryBlock, Role, ToolInvocation, ToolStatus, Turn, UsageStats};

/// Display budget for a tool result before it is cut.
pub const RESULT_PREVIEW_COLUMNS: usize = 200;
pub const TRUNCATED_MARKER: &str = "... (truncated)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    User,
    Assistant,
    Reasoning,
    Tool,
    Blocked,
    Error,
    Meta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: Style,
    pub text: String,
}

impl Line {
    pub fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

pub fn format_turn(turn: &Turn, width: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    match turn.role {
        Role::User => push_prefixed(&mut lines, Style::User, "> ", "  ", &turn.content, width),
        Role::Assistant => {
            for reasoning in &turn.reasoning {
                push_prefixed(&mut lines, Style::Reasoning, "~ ", "  ", reasoning, width);
            }
            if !turn.content.is_empty() {
                push_prefixed(&mut lines, Style::Assistant, "", "", &turn.content, width);
            }
            for invocation in &turn.tool_invocations {
                lines.extend(format_invocation(invocation, width));
            }
            if let Some(line) = turn.usage.as_ref().and_then(format_usage) {
                lines.push(line);
            }
        }
    }
    lines
}

/// Header, decision and (if present) result preview for one tool invocation.
pub fn format_invocation(invocation: &ToolInvocation, width: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut header = format!("* {} [{}]", display_name(invocation), invocation.id);
    if !invocation.requested {
        header.push_str(" (no matching request)");
    }
    lines.push(Line::new(Style::Tool, header));

    if invocation.requested {
        let arguments = compact_arguments(&invocation.arguments);
        if !arguments.is_empty() {
            let budget = width.saturating_sub(4).max(1);
            let (shown, cut) = truncate_to_display_width(&arguments, budget);
            let suffix = if cut { "…" } else { "" };
            lines.push(Line::new(Style::Tool, format!("  │ {shown}{suffix}")));
        }
    }

    if !invocation.allowed {
        let reason = invocation
            .block_reason
            .as_deref()
            .unwrap_or("blocked by policy");
        push_prefixed(&mut lines, Style::Blocked, "  └ blocked: ", "    ", reason, width);
        return lines;
    }

    match &invocation.result {
        Some(outcome) => {
            let (badge, style) = match outcome.status {
                ToolStatus::Success => ("✓ SUCCESS", Style::Tool),
                ToolStatus::Error => ("✗ ERROR", Style::Error),
            };
            lines.push(Line::new(style, format!("  └ {badge}")));

            let (preview, cut) =
                truncate_to_display_width(&outcome.result_text, RESULT_PREVIEW_COLUMNS);
            if !preview.trim().is_empty() {
                push_prefixed(&mut lines, Style::Meta, "    ", "    ", preview.trim_end(), width);
            }
            if cut {
                lines.push(Line::new(Style::Meta, format!("    {TRUNCATED_MARKER}")));
            }
        }
        None => lines.push(Line::new(Style::Meta, "  └ running…")),
    }
    lines
}

pub fn format_error(error: &ExchangeError) -> Line {
    match error {
        ExchangeError::Cancelled => Line::new(Style::Meta, "* Cancelled"),
        ExchangeError::Transport(error) => Line::new(Style::Error, format!("* Error: {error}")),
    }
}

/// The agent's core memory, one labelled section per block.
pub fn format_memory_blocks(blocks: &[MemoryBlock], width: usize) -> Vec<Line> {
    if blocks.is_empty() {
        return vec![Line::new(Style::Meta, "* Core memory is empty")];
    }
    let mut lines = vec![Line::new(Style::Meta, "* Core memory")];
    for block in blocks {
        let used = block.value.chars().count();
        let header = match block.limit {
            Some(limit) => format!("  {} ({used}/{limit} chars)", block.label),
            None => format!("  {} ({used} chars)", block.label),
        };
        lines.push(Line::new(Style::Meta, header));
        if block.value.trim().is_empty() {
            lines.push(Line::new(Style::Meta, "    (empty)"));
        } else {
            push_prefixed(&mut lines, Style::Meta, "    ", "    ", block.value.trim_end(), width);
        }
    }
    lines
}

fn display_name(invocation: &ToolInvocation) -> &str {
    if invocation.name.is_empty() {
        "tool"
    } else {
        &invocation.name
    }
}

fn compact_arguments(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::Object(map) if map.is_empty() => String::new(),
        other => other.to_string(),
    }
}

/// Token counts for a finished turn; `None` when nothing was reported.
pub fn format_usage(usage: &UsageStats) -> Option<Line> {
    if usage.is_empty() {
        return None;
    }
    let part = |label: &str, value: Option<u64>| value.map(|v| format!("{label} {v}"));
    let parts: Vec<String> = [
        part("in", usage.input_tokens),
        part("out", usage.output_tokens),
        part("total", usage.total_tokens),
    ]
    .into_iter()
    .flatten()
    .collect();
    Some(Line::new(
        Style::Meta,
        format!("  tokens: {}", parts.join(" · ")),
    ))
}

fn push_prefixed(
    lines: &mut Vec<Line>,
    style: Style,
    first_prefix: &str,
    rest_prefix: &str,
    text: &str,
    width: usize,
) {
    let prefix_width = display_width(first_prefix).max(display_width(rest_prefix));
    let body_width = width.saturating_sub(prefix_width).max(1);
    for (position, segment) in wrap_lines(text, body_width).into_iter().enumerate() {
        let prefix = if position == 0 { first_prefix } else { rest_prefix };
        lines.push(Line::new(style, format!("{prefix}{segment}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::types::{ToolOutcome, ToolRequest, ToolResult};
    use serde_json::json;

    fn bash_invocation(result_text: Option<&str>) -> ToolInvocation {
        let mut invocation = ToolInvocation::from_request(ToolRequest {
            id: "call_1".to_string(),
            name: "bash".to_string(),
            arguments: json!({"command": "ls"}),
            allowed: true,
            block_reason: None,
        });
        invocation.result = result_text.map(|text| ToolOutcome {
            status: ToolStatus::Success,
            result_text: text.to_string(),
        });
        invocation
    }

    #[test]
    fn test_user_turn_is_prefixed_and_wrapped() {
        let lines = format_turn(&Turn::user("abcdefgh", 0), 6);
        assert_eq!(
            lines,
            vec![Line::new(Style::User, "> abcd"), Line::new(Style::User, "  efgh")]
        );
    }

    #[test]
    fn test_assistant_turn_orders_reasoning_text_tools() {
        let mut turn = Turn::assistant(1);
        turn.reasoning.push("Thinking...".to_string());
        turn.content = "Hi there!".to_string();
        turn.tool_invocations.push(bash_invocation(Some("file.txt")));

        let lines = format_turn(&turn, 80);
        let styles: Vec<Style> = lines.iter().map(|line| line.style).collect();
        assert_eq!(
            styles,
            vec![
                Style::Reasoning,
                Style::Assistant,
                Style::Tool,
                Style::Tool,
                Style::Tool,
                Style::Meta
            ]
        );
        assert_eq!(lines[2].text, "* bash [call_1]");
        assert_eq!(lines[3].text, "  │ {\"command\":\"ls\"}");
        assert_eq!(lines[4].text, "  └ ✓ SUCCESS");
        assert_eq!(lines[5].text, "    file.txt");
    }

    #[test]
    fn test_long_result_is_truncated_with_marker() {
        let long = "x".repeat(RESULT_PREVIEW_COLUMNS + 50);
        let lines = format_invocation(&bash_invocation(Some(&long)), 1000);
        let last = lines.last().unwrap();
        assert_eq!(last.text, format!("    {TRUNCATED_MARKER}"));
        let preview = &lines[lines.len() - 2].text;
        assert_eq!(display_width(preview.trim_start()), RESULT_PREVIEW_COLUMNS);
    }

    #[test]
    fn test_blocked_invocation_shows_reason() {
        let invocation = ToolInvocation::from_request(ToolRequest {
            id: "w1".to_string(),
            name: "write_file".to_string(),
            arguments: json!({}),
            allowed: false,
            block_reason: Some("write_file is blocked in read-only mode".to_string()),
        });
        let lines = format_invocation(&invocation, 80);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].style, Style::Blocked);
        assert_eq!(
            lines[1].text,
            "  └ blocked: write_file is blocked in read-only mode"
        );
    }

    #[test]
    fn test_unmatched_and_pending_invocations() {
        let unmatched = ToolInvocation::from_unmatched_result(ToolResult {
            id: "ghost".to_string(),
            name: String::new(),
            status: ToolStatus::Error,
            result_text: "boom".to_string(),
        });
        let lines = format_invocation(&unmatched, 80);
        assert_eq!(lines[0].text, "* tool [ghost] (no matching request)");
        assert_eq!(lines[1], Line::new(Style::Error, "  └ ✗ ERROR"));

        let pending = format_invocation(&bash_invocation(None), 80);
        assert_eq!(pending.last().unwrap().text, "  └ running…");
    }

    #[test]
    fn test_memory_blocks_render_as_meta_lines() {
        let blocks = vec![
            MemoryBlock {
                label: "persona".to_string(),
                value: "I am helpful.".to_string(),
                limit: Some(5000),
            },
            MemoryBlock {
                label: "human".to_string(),
                value: String::new(),
                limit: None,
            },
        ];
        let lines = format_memory_blocks(&blocks, 80);
        assert!(lines.iter().all(|line| line.style == Style::Meta));
        let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "* Core memory",
                "  persona (13/5000 chars)",
                "    I am helpful.",
                "  human (0 chars)",
                "    (empty)",
            ]
        );
        assert_eq!(
            format_memory_blocks(&[], 80),
            vec![Line::new(Style::Meta, "* Core memory is empty")]
        );
    }

    #[test]
    fn test_usage_and_error_lines() {
        let mut turn = Turn::assistant(1);
        turn.usage = Some(UsageStats {
            input_tokens: Some(10),
            output_tokens: None,
            total_tokens: Some(12),
        });
        let lines = format_turn(&turn, 80);
        assert_eq!(lines, vec![Line::new(Style::Meta, "  tokens: in 10 · total 12")]);

        let error = ExchangeError::Transport(TransportError::Stream("reset".to_string()));
        assert_eq!(format_error(&error).style, Style::Error);
        assert_eq!(format_error(&ExchangeError::Cancelled).text, "* Cancelled");
    }
}
