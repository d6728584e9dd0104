use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::TransportError;
use crate::types::MemoryBlock;
use crate::util::{is_local_endpoint_url, join_url};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(
        &self,
        agent_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<ByteStream, TransportError>;
    fn mock_history(
        &self,
        _agent_id: &str,
        _conversation_id: Option<&str>,
    ) -> Result<Vec<Value>, TransportError> {
        Ok(Vec::new())
    }
    fn mock_core_memory(&self, _agent_id: &str) -> Result<Vec<MemoryBlock>, TransportError> {
        Ok(Vec::new())
    }
}

/// HTTP client for the agent service.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            #[cfg(test)]
            mock_stream_producer: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            base_url: "http://localhost:8283".to_string(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one user message and returns the raw SSE byte stream of the
    /// agent's response. With a `conversation_id` the message joins that
    /// conversation instead of the agent's default one.
    pub async fn stream_message(
        &self,
        agent_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<ByteStream, TransportError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(agent_id, conversation_id, text);
            }
        }

        let request_url = join_url(
            &self.base_url,
            &format!("v1/agents/{agent_id}/messages/stream"),
        );
        let payload = message_payload(text, conversation_id);
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .authorized(self.http.post(&request_url))
            .header("accept", "text/event-stream")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;
        let response = check_status(response, &request_url).await?;

        tracing::debug!(url = %request_url, "agent stream opened");
        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| TransportError::Stream(format!("{request_url_for_stream}: {error}")))
        });
        Ok(Box::pin(stream))
    }

    /// Fetches up to `limit` stored raw messages for `agent_id`, oldest first,
    /// narrowed to one conversation when `conversation_id` is set.
    pub async fn fetch_history(
        &self,
        agent_id: &str,
        conversation_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Value>, TransportError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.mock_history(agent_id, conversation_id);
            }
        }

        let request_url = join_url(&self.base_url, &format!("v1/agents/{agent_id}/messages"));
        let mut request = self
            .authorized(self.http.get(&request_url))
            .query(&[("limit", limit.to_string())]);
        if let Some(conversation_id) = conversation_id {
            request = request.query(&[("conversation_id", conversation_id)]);
        }
        let response = request
            .send()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;
        let response = check_status(response, &request_url).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;
        Ok(history_items(body))
    }

    pub async fn fetch_core_memory(&self, agent_id: &str) -> Result<Vec<MemoryBlock>, TransportError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.mock_core_memory(agent_id);
            }
        }

        let request_url = join_url(&self.base_url, &format!("v1/agents/{agent_id}/core-memory"));
        let response = self
            .authorized(self.http.get(&request_url))
            .send()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;
        let response = check_status(response, &request_url).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;
        Ok(MemoryBlock::from_response(body))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.header("authorization", format!("Bearer {api_key}")),
            None => request,
        }
    }
}

fn message_payload(text: &str, conversation_id: Option<&str>) -> Value {
    let mut payload = json!({
        "messages": [{
            "role": "user",
            "content": text,
        }],
        "stream_tokens": true,
    });
    if let Some(conversation_id) = conversation_id {
        payload["conversation_id"] = Value::String(conversation_id.to_string());
    }
    payload
}

/// Accepts either a bare array or an object wrapping one under `messages`
/// or `items`.
fn history_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut object) => ["messages", "items"]
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

async fn check_status(
    response: reqwest::Response,
    request_url: &str,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        url: request_url.to_string(),
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

fn truncate_body(body: &str) -> String {
    const MAX_BODY_CHARS: usize = 512;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn map_request_error(error: reqwest::Error, request_url: &str) -> TransportError {
    let message = if is_local_endpoint_url(request_url) && error.is_connect() {
        format!(
            "cannot reach local agent server '{request_url}': {error}. Start the server or update LETTA_BASE_URL."
        )
    } else if error.is_connect() {
        format!("cannot reach agent endpoint '{request_url}': {error}")
    } else if error.is_timeout() {
        format!("request to '{request_url}' timed out: {error}")
    } else if error.is_decode() {
        format!("response from '{request_url}' could not be decoded: {error}")
    } else {
        format!("request to '{request_url}' failed: {error}")
    };
    TransportError::Request {
        url: request_url.to_string(),
        message,
    }
}
