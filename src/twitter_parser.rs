use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::twitter_message::RawStreamRecord;

/// Raw body of a streaming response, one item per network read.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Lazily decoded records of one stream connection.
pub type RecordStream = BoxStream<'static, Result<RawStreamRecord>>;

/// Splits an incoming byte stream into newline-terminated lines.
///
/// Bytes after the last `\n` are held back until a later chunk completes the
/// line, so the output does not depend on where reads happened to split the
/// stream. Splitting on bytes keeps multi-byte UTF-8 sequences intact across
/// reads.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, blank lines excluded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Bytes of the line currently being accumulated.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Parse and validate one complete stream line.
pub fn parse_line(line: &[u8]) -> Result<RawStreamRecord> {
    let text = String::from_utf8(line.to_vec()).map_err(|source| Error::InvalidUtf8 { source })?;
    let text = text.trim_end_matches('\r');

    let record: RawStreamRecord = serde_json::from_str(text).map_err(|source| Error::Parse {
        line: text.to_string(),
        source,
    })?;

    record.validate().map_err(|reason| Error::Invalid {
        line: text.to_string(),
        reason,
    })?;

    Ok(record)
}

struct DecodeState {
    bytes: Option<ByteStream>,
    decoder: LineDecoder,
    ready: VecDeque<Result<RawStreamRecord>>,
}

/// Decode a live byte stream into one result per non-blank line.
///
/// Parse and validation failures are yielded for their line only and decoding
/// carries on. A read failure is yielded once and ends the sequence; so does
/// the stream closing on its own, silently. The byte stream is dropped as soon
/// as either happens, and dropping the returned stream early drops it too.
pub fn decode_records(bytes: ByteStream) -> RecordStream {
    let state = DecodeState {
        bytes: Some(bytes),
        decoder: LineDecoder::new(),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }

            let bytes = state.bytes.as_mut()?;
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.decoder.push(&chunk) {
                        state.ready.push_back(parse_line(&line));
                    }
                }
                Some(Err(err)) => {
                    error!(error = %err.report(), "Fatal stream read error");
                    state.bytes = None;
                    return Some((Err(err), state));
                }
                None => {
                    info!("Filtered stream closed naturally");
                    if !state.decoder.pending().is_empty() {
                        debug!(
                            bytes = state.decoder.pending().len(),
                            "Discarding unterminated trailing line"
                        );
                    }
                    state.bytes = None;
                }
            }
        }
    })
    .boxed()
}
