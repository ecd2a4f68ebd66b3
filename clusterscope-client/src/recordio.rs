//! RecordIO framing for the master's subscribe stream.
//!
//! Each record is `<decimal length>\n<payload>`. HTTP chunk boundaries are
//! unrelated to record boundaries, so the decoder buffers partial input.

use crate::api_client::ApiClientError;
use crate::transport::EventStream;
use clusterscope_core::Event;
use futures_util::stream::{self, Stream, StreamExt};

/// Largest record accepted before the stream is considered corrupt.
pub const MAX_RECORD_LEN: usize = 512 * 1024 * 1024;

/// Longest decimal length prefix we bother scanning for a newline.
const MAX_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordIoError {
    #[error("invalid record length header: {0:?}")]
    InvalidLength(String),
    #[error("record of {len} bytes exceeds limit of {max}")]
    RecordTooLarge { len: usize, max: usize },
    #[error("stream ended inside a record ({buffered} bytes buffered)")]
    Truncated { buffered: usize },
}

#[derive(Debug, Default)]
pub struct RecordIoDecoder {
    buffer: Vec<u8>,
}

impl RecordIoDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete record, or `Ok(None)` when more input is needed.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>, RecordIoError> {
        let newline = match self.buffer.iter().position(|b| *b == b'\n') {
            Some(pos) => pos,
            None if self.buffer.len() > MAX_HEADER_LEN => {
                return Err(RecordIoError::InvalidLength(
                    String::from_utf8_lossy(&self.buffer[..MAX_HEADER_LEN]).into_owned(),
                ));
            }
            None => return Ok(None),
        };

        let header = &self.buffer[..newline];
        let len = std::str::from_utf8(header)
            .ok()
            .map(str::trim)
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| {
                RecordIoError::InvalidLength(String::from_utf8_lossy(header).into_owned())
            })?;
        if len > MAX_RECORD_LEN {
            return Err(RecordIoError::RecordTooLarge {
                len,
                max: MAX_RECORD_LEN,
            });
        }

        let start = newline + 1;
        let end = start + len;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let record = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(record))
    }
}

struct DecodeState<S> {
    chunks: S,
    decoder: RecordIoDecoder,
    finished: bool,
}

/// Turn a stream of byte chunks into a stream of decoded events.
///
/// A record whose payload does not decode is reported as
/// [`ApiClientError::MalformedRecord`] and decoding carries on with the next
/// one. Any framing or transport error ends the output.
pub fn decode_stream<S, B, E>(chunks: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiClientError> + Send + 'static,
{
    let state = DecodeState {
        chunks: Box::pin(chunks),
        decoder: RecordIoDecoder::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            match state.decoder.next_record() {
                Ok(Some(record)) => {
                    let item = serde_json::from_slice::<Event>(&record)
                        .map_err(ApiClientError::MalformedRecord);
                    return Some((item, state));
                }
                Ok(None) => {}
                Err(err) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => state.decoder.extend(chunk.as_ref()),
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
                None if state.decoder.is_empty() => return None,
                None => {
                    state.finished = true;
                    let err = RecordIoError::Truncated {
                        buffered: state.decoder.buffered(),
                    };
                    return Some((Err(err.into()), state));
                }
            }
        }
    })
    .boxed()
}
