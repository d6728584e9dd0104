use crate::runtime::mode::Mode;
use crate::util::is_local_endpoint_url;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "http://localhost:8283";
const DEFAULT_HISTORY_LIMIT: usize = 50;
const STATE_FILE_NAME: &str = ".openletta.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub agent_id: Option<String>,
    pub initial_mode: Option<Mode>,
    pub history_limit: usize,
    pub state_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let base_url =
            std::env::var("LETTA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = non_empty_env("LETTA_API_KEY");
        let agent_id = non_empty_env("LETTA_AGENT_ID");
        let initial_mode = match non_empty_env("OPENLETTA_MODE") {
            Some(value) => Some(
                value
                    .parse::<Mode>()
                    .map_err(anyhow::Error::msg)
                    .context("invalid OPENLETTA_MODE")?,
            ),
            None => None,
        };
        let history_limit = std::env::var("OPENLETTA_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_HISTORY_LIMIT);
        let state_path = match non_empty_env("OPENLETTA_STATE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_state_path()?,
        };

        Ok(Self {
            api_key,
            base_url,
            agent_id,
            initial_mode,
            history_limit,
            state_path,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "Invalid LETTA_BASE_URL '{}': expected http:// or https:// URL",
                self.base_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "LETTA_API_KEY must be set for non-local endpoints (url: '{}')",
                self.base_url
            );
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.base_url)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_state_path() -> Result<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) => Ok(PathBuf::from(home).join(STATE_FILE_NAME)),
        None => Ok(std::env::current_dir()?.join(STATE_FILE_NAME)),
    }
}

/// Values remembered between runs: last agent, conversation, and mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl SessionState {
    /// Reads the state file. A missing file yields the default state; a
    /// corrupt one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "cannot read session state");
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring corrupt session state");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("cannot write session state to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, api_key: Option<&str>) -> Config {
        Config {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            agent_id: None,
            initial_mode: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            state_path: PathBuf::from("/tmp/openletta-state.json"),
        }
    }

    #[test]
    fn test_validate_requires_key_for_remote_endpoint() {
        assert!(config("https://api.letta.com", None).validate().is_err());
        assert!(config("https://api.letta.com", Some("sk")).validate().is_ok());
        assert!(config("http://localhost:8283", None).validate().is_ok());
        assert!(config("ftp://localhost", None).validate().is_err());
    }

    #[test]
    fn test_load_reads_mode_and_limit() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("OPENLETTA_MODE", "build");
        std::env::set_var("OPENLETTA_HISTORY_LIMIT", "7");
        std::env::set_var("OPENLETTA_STATE_PATH", "/tmp/state.json");
        let loaded = Config::load().unwrap();
        assert_eq!(loaded.initial_mode, Some(Mode::FullAccess));
        assert_eq!(loaded.history_limit, 7);
        assert_eq!(loaded.state_path, PathBuf::from("/tmp/state.json"));

        std::env::set_var("OPENLETTA_MODE", "sideways");
        assert!(Config::load().is_err());

        std::env::remove_var("OPENLETTA_MODE");
        std::env::remove_var("OPENLETTA_HISTORY_LIMIT");
        std::env::remove_var("OPENLETTA_STATE_PATH");
    }

    #[test]
    fn test_session_state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert_eq!(SessionState::load(&path), SessionState::default());

        let state = SessionState {
            agent_id: Some("agent-1".to_string()),
            conversation_id: None,
            mode: Some(Mode::FullAccess),
        };
        state.save(&path).unwrap();
        assert_eq!(SessionState::load(&path), state);

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(SessionState::load(&path), SessionState::default());
    }
}
