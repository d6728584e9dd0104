use super::client::ByteStream;
use super::logging::emit_sse_parse_error;
use super::normalize::Normalizer;
use crate::error::TransportError;
use crate::runtime::mode::ModeControl;
use crate::types::NormalizedEvent;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;

pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<NormalizedEvent, TransportError>> + Send>>;

/// Incremental server-sent-events parser yielding the JSON payload of each
/// `data:` frame.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    partial_utf8: Vec<u8>,
    saw_done: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.decode_into_buffer(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find("\n\n") {
            let frame_end = start + end + 2;
            let frame = &self.buffer[start..frame_end];

            let mut event_type = None;
            let mut data_lines = Vec::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event_type = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.trim());
                }
            }

            let data = data_lines.join("\n");
            if data == "[DONE]" {
                self.saw_done = true;
            } else if !data.is_empty() {
                match serde_json::from_str::<Value>(&data) {
                    Ok(payload) => payloads.push(payload),
                    Err(error) => emit_sse_parse_error(event_type.as_deref(), &data, &error),
                }
            }

            start = frame_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        payloads
    }

    /// Appends `chunk` to the text buffer, holding back a trailing partial
    /// UTF-8 sequence until the next chunk completes it.
    fn decode_into_buffer(&mut self, chunk: &[u8]) {
        self.partial_utf8.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.partial_utf8);
        match std::str::from_utf8(&bytes) {
            Ok(text) => self.buffer.push_str(text),
            Err(error) if error.error_len().is_none() => {
                let (complete, rest) = bytes.split_at(error.valid_up_to());
                self.buffer.push_str(&String::from_utf8_lossy(complete));
                self.partial_utf8 = rest.to_vec();
            }
            Err(_) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
        }
    }

    /// Flushes the parser at end of input. A remainder carrying a `data:`
    /// line that does not parse means the source stopped mid-frame; comments
    /// and bare `event:` lines are dropped.
    pub fn finish(&mut self) -> Result<Vec<Value>, TransportError> {
        let mut rest = std::mem::take(&mut self.buffer);
        if !self.partial_utf8.is_empty() {
            rest.push_str(&String::from_utf8_lossy(&std::mem::take(&mut self.partial_utf8)));
        }
        if !rest.lines().any(|line| line.starts_with("data:")) {
            return Ok(Vec::new());
        }
        // A final frame without the trailing blank line is still complete.
        let payloads = self.process(format!("{}\n\n", rest.trim_end()).as_bytes());
        if payloads.is_empty() && !self.saw_done {
            return Err(TransportError::Truncated {
                pending_bytes: rest.len(),
            });
        }
        Ok(payloads)
    }
}

struct NormalizeState {
    bytes: ByteStream,
    parser: Option<SseParser>,
    pending: VecDeque<Value>,
    normalizer: Normalizer,
    mode: ModeControl,
    end_error: Option<TransportError>,
    failed: bool,
}

/// Adapts a raw byte stream into an ordered stream of normalized events.
///
/// The mode is read once per raw payload, right before it is normalized.
/// Payloads the normalizer cannot classify are skipped. The first transport
/// failure is yielded once and ends the stream. A source that closes without
/// `data: [DONE]` yields `TransportError::EndedWithoutDone` after its last
/// event.
pub fn normalized_events(
    bytes: ByteStream,
    normalizer: Normalizer,
    mode: ModeControl,
) -> EventStream {
    let state = NormalizeState {
        bytes,
        parser: Some(SseParser::new()),
        pending: VecDeque::new(),
        normalizer,
        mode,
        end_error: None,
        failed: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.failed {
                return None;
            }

            while let Some(raw) = state.pending.pop_front() {
                if let Some(event) = state.normalizer.normalize(&raw, state.mode.get()) {
                    return Some((Ok(event), state));
                }
            }

            let Some(parser) = state.parser.as_mut() else {
                let error = state.end_error.take()?;
                state.failed = true;
                return Some((Err(error), state));
            };
            match state.bytes.next().await {
                Some(Ok(chunk)) => state.pending.extend(parser.process(&chunk)),
                Some(Err(error)) => {
                    state.failed = true;
                    return Some((Err(error), state));
                }
                None => {
                    let finished = parser.finish();
                    let saw_done = parser.saw_done();
                    state.parser = None;
                    match finished {
                        Ok(rest) => state.pending.extend(rest),
                        Err(error) => {
                            state.failed = true;
                            return Some((Err(error), state));
                        }
                    }
                    if !saw_done {
                        state.end_error = Some(TransportError::EndedWithoutDone);
                    }
                }
            }
        }
    }))
}
