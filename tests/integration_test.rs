use openletta::api::normalize;
use openletta::config::{Config, SessionState};
use openletta::runtime::mode::Mode;
use openletta::state::aggregate;
use openletta::types::{NormalizedEvent, Role, ToolStatus};
use serde_json::{json, Value};
use std::path::PathBuf;

fn config(base_url: &str, api_key: Option<&str>) -> Config {
    Config {
        api_key: api_key.map(str::to_string),
        base_url: base_url.to_string(),
        agent_id: Some("agent-1".to_string()),
        initial_mode: None,
        history_limit: 50,
        state_path: PathBuf::from("/tmp/openletta-test-state.json"),
    }
}

fn replay(raw: &[Value], mode: Mode) -> Vec<openletta::types::Turn> {
    aggregate(raw.iter().filter_map(|payload| normalize(payload, mode)))
}

#[test]
fn test_config_validation_allows_local_endpoint_without_api_key() {
    assert!(config("http://127.0.0.1:8283", None).validate().is_ok());
}

#[test]
fn test_config_validation_rejects_remote_endpoint_without_api_key() {
    assert!(config("https://api.letta.com", None).validate().is_err());
}

#[test]
fn test_history_replay_builds_turns_with_paired_tools() {
    let raw = vec![
        json!({"message_type": "user_message", "content": "Run bash"}),
        json!({"message_type": "reasoning_message", "reasoning": "I should list files"}),
        json!({"message_type": "tool_call_message", "tool_call": {"tool_call_id": "1", "name": "bash", "arguments": "{\"command\":\"ls\"}"}}),
        json!({"message_type": "tool_return_message", "tool_call_id": "1", "status": "success", "tool_return": "file.txt"}),
        json!({"message_type": "assistant_message", "content": "There is one file."}),
        json!({"message_type": "heartbeat"}),
        json!("not an object"),
    ];
    let turns = replay(&raw, Mode::FullAccess);

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    let assistant = &turns[1];
    assert_eq!(assistant.content, "There is one file.");
    assert_eq!(assistant.reasoning.len(), 1);
    let invocation = &assistant.tool_invocations[0];
    assert!(invocation.allowed);
    let outcome = invocation.result.as_ref().unwrap();
    assert_eq!(outcome.status, ToolStatus::Success);
    assert_eq!(outcome.result_text, "file.txt");
}

#[test]
fn test_read_only_replay_marks_mutating_tools_blocked() {
    let raw = vec![
        json!({"type": "tool_use", "id": "e1", "name": "edit_file", "input": {"path": "a.rs"}}),
        json!({"type": "tool_use", "id": "b1", "name": "bash", "input": {"command": "cargo publish --dry-run"}}),
        json!({"type": "tool_use", "id": "r1", "name": "read_file", "input": {"path": "a.rs"}}),
    ];
    let turns = replay(&raw, Mode::ReadOnly);

    let decisions: Vec<(bool, Option<&str>)> = turns[0]
        .tool_invocations
        .iter()
        .map(|inv| (inv.allowed, inv.block_reason.as_deref()))
        .collect();
    assert_eq!(
        decisions,
        vec![
            (false, Some("edit_file is blocked in read-only mode")),
            (true, None),
            (true, None),
        ]
    );
}

#[test]
fn test_field_name_variants_normalize_identically() {
    let variants = [
        json!({"message_type": "tool_call_message", "tool_call": {"tool_call_id": "7", "name": "bash", "arguments": "{\"command\":\"ls\"}"}}),
        json!({"role": "assistant", "tool_calls": [{"id": "7", "function": {"name": "bash", "arguments": "{\"command\":\"ls\"}"}}]}),
        json!({"type": "tool_call", "tool_call_id": "7", "tool_name": "bash", "args": {"command": "ls"}}),
    ];
    let events: Vec<NormalizedEvent> = variants
        .iter()
        .map(|raw| normalize(raw, Mode::FullAccess).unwrap())
        .collect();
    assert_eq!(events[0], events[1]);
    assert_eq!(events[1], events[2]);
}

#[test]
fn test_normalized_events_serialize_with_kind_tag() {
    let event = NormalizedEvent::assistant_text("hi");
    let encoded = serde_json::to_value(&event).unwrap();
    assert_eq!(encoded["kind"], "assistant_text_delta");
}

#[test]
fn test_session_state_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let state = SessionState {
        agent_id: Some("agent-1".to_string()),
        conversation_id: Some("conv-9".to_string()),
        mode: Some(Mode::FullAccess),
    };
    state.save(&path).unwrap();
    assert_eq!(SessionState::load(&path), state);

    std::fs::write(&path, "{not json").unwrap();
    assert_eq!(SessionState::load(&path), SessionState::default());
}
