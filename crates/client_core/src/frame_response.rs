//! Decoding of hidden-frame response bodies.
//!
//! A frame body is HTML whose script blocks hand command arrays to the parent
//! page, one `Sijax.processCommands([...])` call per flush. Streaming servers
//! flush several times and pad the first flush, so bodies are consumed
//! incrementally.

use serde_json::Value;
use shared::protocol::CommandBatch;
use thiserror::Error;
use tracing::{trace, warn};

const MARKER: &str = "Sijax.processCommands(";

#[derive(Debug, Error)]
#[error("malformed command payload in frame body: {source}")]
pub struct FrameError {
    source: serde_json::Error,
}

enum Step {
    Batch(Vec<Value>, usize),
    Malformed(serde_json::Error, usize),
    Wait(usize),
}

#[derive(Debug, Default, Clone)]
pub struct FrameResponseDecoder {
    buffer: String,
    decoded: usize,
}

impl FrameResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one body chunk, returning every batch it completes, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<Result<CommandBatch, FrameError>> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let Some(start) = self.buffer.find(MARKER) else {
                let keep = partial_marker_len(&self.buffer);
                self.buffer.drain(..self.buffer.len() - keep);
                break;
            };

            let step = {
                let payload_start = start + MARKER.len();
                let mut stream = serde_json::Deserializer::from_str(&self.buffer[payload_start..])
                    .into_iter::<Vec<Value>>();
                match stream.next() {
                    None => Step::Wait(start),
                    Some(Ok(values)) => Step::Batch(values, payload_start + stream.byte_offset()),
                    Some(Err(err)) if err.is_eof() => Step::Wait(start),
                    Some(Err(err)) => Step::Malformed(err, payload_start),
                }
            };

            match step {
                Step::Batch(values, consumed) => {
                    self.buffer.drain(..consumed);
                    self.decoded += 1;
                    trace!(commands = values.len(), "frame: batch decoded");
                    out.push(Ok(CommandBatch::from(values)));
                }
                Step::Malformed(source, consumed) => {
                    self.buffer.drain(..consumed);
                    warn!("frame: dropping malformed payload: {source}");
                    out.push(Err(FrameError { source }));
                }
                Step::Wait(start) => {
                    self.buffer.drain(..start);
                    break;
                }
            }
        }
        out
    }

    /// True when a started payload is still waiting for the rest of its bytes.
    pub fn has_pending(&self) -> bool {
        self.buffer.starts_with(MARKER)
    }

    pub fn batches_decoded(&self) -> usize {
        self.decoded
    }

    /// Decodes a complete body, failing on the first malformed payload.
    pub fn decode_all(body: &str) -> Result<Vec<CommandBatch>, FrameError> {
        Self::new().push(body).into_iter().collect()
    }
}

/// Length of the longest suffix of `buffer` that could begin the marker.
fn partial_marker_len(buffer: &str) -> usize {
    (1..MARKER.len())
        .rev()
        .find(|len| buffer.ends_with(&MARKER[..*len]))
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "tests/frame_response_tests.rs"]
mod tests;
