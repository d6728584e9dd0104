use thiserror::Error;

/// A raw payload that could not be classified. Always non-fatal: callers drop
/// the payload and keep reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no message_type, type, or role discriminant")]
    MissingDiscriminant,
    #[error("unrecognized event kind '{0}'")]
    UnknownKind(String),
    #[error("{kind} payload is missing '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

/// Tool-invocation arguments that were not valid JSON. Non-fatal: the
/// arguments default to an empty object.
#[derive(Debug, Error)]
#[error("tool '{tool}' arguments are not valid JSON: {source}")]
pub struct ArgumentParseError {
    pub tool: String,
    #[source]
    pub source: serde_json::Error,
}

/// The underlying event source failed. Fatal to the current exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{message}")]
    Request { url: String, message: String },
    #[error("agent endpoint '{url}' returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("event stream failed: {0}")]
    Stream(String),
    #[error("event stream ended mid-frame ({pending_bytes} bytes unparsed)")]
    Truncated { pending_bytes: usize },
    #[error("event stream closed before the [DONE] marker")]
    EndedWithoutDone,
}

/// Terminal outcome of one request/response exchange that did not produce a
/// finished assistant turn.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("exchange cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PolicyConfigError {
    #[error("invalid dry-run marker set: {0}")]
    Markers(#[from] aho_corasick::BuildError),
}
