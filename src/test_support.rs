use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

/// Process-wide lock for tests that mutate environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Renders raw payloads as `data:` frames, ending with the `[DONE]` sentinel.
pub fn sse_frames(payloads: &[Value]) -> Vec<String> {
    payloads
        .iter()
        .map(|payload| format!("data: {payload}"))
        .chain(std::iter::once("data: [DONE]".to_string()))
        .collect()
}
