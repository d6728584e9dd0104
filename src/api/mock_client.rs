use crate::api::client::{ByteStream, MockStreamProducer};
use crate::error::TransportError;
use crate::types::MemoryBlock;
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One scripted chunk of a mock response.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Frame(String),
    Fail(TransportError),
}

/// A message the mock was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub agent_id: String,
    pub conversation_id: Option<String>,
    pub text: String,
}

impl SentMessage {
    pub fn new(agent_id: &str, conversation_id: Option<&str>, text: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            text: text.to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<MockChunk>>>>,
    history: Arc<Mutex<Vec<Value>>>,
    core_memory: Arc<Mutex<Vec<MemoryBlock>>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    history_requests: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockApiClient {
    /// Each inner vector is one response; each string is one SSE frame body.
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        let scripted = responses
            .into_iter()
            .map(|frames| frames.into_iter().map(MockChunk::Frame).collect())
            .collect();
        Self::scripted(scripted)
    }

    pub fn scripted(responses: Vec<Vec<MockChunk>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    pub fn with_history(self, history: Vec<Value>) -> Self {
        self.set_history(history);
        self
    }

    /// Replaces the canned history; clones share it.
    pub fn set_history(&self, history: Vec<Value>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn with_core_memory(self, blocks: Vec<MemoryBlock>) -> Self {
        *self.core_memory.lock().unwrap() = blocks;
        self
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The conversation id passed with each history fetch, in order.
    pub fn history_requests(&self) -> Vec<Option<String>> {
        self.history_requests.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(
        &self,
        agent_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<ByteStream, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push(SentMessage::new(agent_id, conversation_id, text));

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(TransportError::Stream(
                "MockApiClient: No more responses configured".to_string(),
            ));
        }
        let chunks = responses_guard.remove(0);

        let byte_chunks: Vec<Result<Bytes, TransportError>> = chunks
            .into_iter()
            .map(|chunk| match chunk {
                MockChunk::Frame(s) => {
                    let framed = if s.ends_with("\n\n") {
                        s
                    } else {
                        format!("{s}\n\n")
                    };
                    Ok(Bytes::from(framed))
                }
                MockChunk::Fail(error) => Err(error),
            })
            .collect();

        Ok(Box::pin(stream::iter(byte_chunks)))
    }

    fn mock_history(
        &self,
        _agent_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<Vec<Value>, TransportError> {
        self.history_requests
            .lock()
            .unwrap()
            .push(conversation_id.map(str::to_string));
        Ok(self.history.lock().unwrap().clone())
    }

    fn mock_core_memory(&self, _agent_id: &str) -> Result<Vec<MemoryBlock>, TransportError> {
        Ok(self.core_memory.lock().unwrap().clone())
    }
}
