use crate::util::parse_bool_str;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "/tmp/openletta-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "OPENLETTA_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "OPENLETTA_LOG_PATH";
const LOG_FILTER_ENV: &str = "OPENLETTA_LOG";
const DEFAULT_LOG_FILTER: &str = "openletta=info";

/// Installs the global tracing subscriber.
///
/// Logs go to a file whenever one can be resolved so they do not interleave
/// with the transcript; otherwise they go to stderr.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let log_file = resolve_log_path().and_then(|path| open_log_file(&path).ok());
    let installed = match log_file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|value| parse_bool_str(&value))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = %request_url, payload = %formatted_payload, "agent request payload");
}

pub fn emit_sse_parse_error(
    event_type: Option<&str>,
    json_data: &str,
    parse_error: &serde_json::Error,
) {
    tracing::warn!(
        error = %parse_error,
        event_type = event_type.unwrap_or("<none>"),
        data = %json_data,
        "sse payload is not valid JSON"
    );
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn open_log_file(path: &str) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "off");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
    }

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_PATH_ENV, " /tmp/openletta-test.log ");
        assert_eq!(
            resolve_log_path().as_deref(),
            Some("/tmp/openletta-test.log")
        );
        std::env::remove_var(LOG_PATH_ENV);
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let path = path.to_string_lossy().into_owned();
        open_log_file(&path).unwrap();
        assert!(std::path::Path::new(&path).exists());
    }
}
