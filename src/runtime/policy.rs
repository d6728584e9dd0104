use super::mode::Mode;
use crate::error::PolicyConfigError;
use aho_corasick::AhoCorasick;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

pub const DEFAULT_SHELL_TOOLS: &[&str] = &[
    "bash",
    "shell",
    "execute-shell",
    "execute_shell",
    "run_shell",
    "run_command",
    "exec",
];

pub const DEFAULT_FILE_MUTATING_TOOLS: &[&str] = &[
    "edit-file",
    "edit_file",
    "edit",
    "str_replace",
    "write-file",
    "write_file",
    "write",
    "create_file",
    "apply_patch",
];

pub const DEFAULT_DRY_RUN_MARKERS: &[&str] = &["--dry-run", "--dryrun", "--what-if", "--simulate"];

/// Argument keys that may carry a shell command string.
const COMMAND_KEYS: &[&str] = &["command", "cmd"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub block_reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            block_reason: None,
        }
    }

    pub fn block(reason: String) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason),
        }
    }
}

/// The name sets and marker list a [`ToolPolicy`] is built from.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub shell_tools: Vec<String>,
    pub file_mutating_tools: Vec<String>,
    pub dry_run_markers: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|name| name.to_string()).collect();
        Self {
            shell_tools: owned(DEFAULT_SHELL_TOOLS),
            file_mutating_tools: owned(DEFAULT_FILE_MUTATING_TOOLS),
            dry_run_markers: owned(DEFAULT_DRY_RUN_MARKERS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolPolicy {
    shell_tools: HashSet<String>,
    file_mutating_tools: HashSet<String>,
    dry_run_markers: Option<AhoCorasick>,
}

impl ToolPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyConfigError> {
        let lowered = |names: Vec<String>| {
            names
                .into_iter()
                .map(|name| name.trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect::<HashSet<_>>()
        };

        let markers: Vec<String> = config
            .dry_run_markers
            .into_iter()
            .filter(|marker| !marker.is_empty())
            .collect();
        let dry_run_markers = if markers.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .ascii_case_insensitive(true)
                    .build(&markers)?,
            )
        };

        Ok(Self {
            shell_tools: lowered(config.shell_tools),
            file_mutating_tools: lowered(config.file_mutating_tools),
            dry_run_markers,
        })
    }

    /// Decides whether `tool_name` may run under `mode`.
    ///
    /// Total over all inputs: unknown tool names and odd argument shapes are
    /// allowed rather than rejected.
    pub fn decide(&self, tool_name: &str, arguments: &Value, mode: Mode) -> PolicyDecision {
        if mode == Mode::FullAccess {
            return PolicyDecision::allow();
        }

        let normalized = tool_name.trim().to_ascii_lowercase();
        let is_shell = self.shell_tools.contains(&normalized);
        if !is_shell && !self.file_mutating_tools.contains(&normalized) {
            return PolicyDecision::allow();
        }

        if is_shell && self.is_dry_run(arguments) {
            return PolicyDecision::allow();
        }

        PolicyDecision::block(format!("{tool_name} is blocked in read-only mode"))
    }

    pub fn is_mutating(&self, tool_name: &str) -> bool {
        let normalized = tool_name.trim().to_ascii_lowercase();
        self.shell_tools.contains(&normalized) || self.file_mutating_tools.contains(&normalized)
    }

    fn is_dry_run(&self, arguments: &Value) -> bool {
        let Some(markers) = &self.dry_run_markers else {
            return false;
        };
        COMMAND_KEYS
            .iter()
            .filter_map(|key| arguments.get(*key))
            .filter_map(command_text)
            .any(|command| markers.is_match(command.as_str()))
    }
}

/// Flattens a command argument into one string. Accepts either a plain
/// string or an argv-style array of strings.
fn command_text(value: &Value) -> Option<String> {
    match value {
        Value::String(command) => Some(command.clone()),
        Value::Array(parts) => {
            let words: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            (!words.is_empty()).then(|| words.join(" "))
        }
        _ => None,
    }
}

/// Process-wide policy built from the default constants. Every call hands
/// out the same allocation.
pub fn default_tool_policy() -> Arc<ToolPolicy> {
    static POLICY: OnceLock<Arc<ToolPolicy>> = OnceLock::new();
    let policy = POLICY.get_or_init(|| match ToolPolicy::new(PolicyConfig::default()) {
        Ok(policy) => Arc::new(policy),
        Err(error) => {
            // Without markers only the dry-run carve-out is lost.
            tracing::error!(%error, "default dry-run markers rejected");
            Arc::new(ToolPolicy {
                shell_tools: DEFAULT_SHELL_TOOLS.iter().map(|s| s.to_string()).collect(),
                file_mutating_tools: DEFAULT_FILE_MUTATING_TOOLS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                dry_run_markers: None,
            })
        }
    });
    Arc::clone(policy)
}

/// Convenience wrapper over [`default_tool_policy`].
pub fn decide(tool_name: &str, arguments: &Value, mode: Mode) -> PolicyDecision {
    default_tool_policy().decide(tool_name, arguments, mode)
}
