//! Newline-delimited JSON framing for streamed request and response bodies.

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::service::StreamError;

pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// Longest line [`decode`] accepts, newline excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Serialize one item as a JSON line.
pub fn encode_line<T: Serialize>(item: &T) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(item)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

struct Decoder<S> {
    body: S,
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    line: usize,
    eof: bool,
    failed: bool,
}

impl<S> Decoder<S> {
    /// Next complete, non-blank line in the buffer. At end of input the unterminated
    /// remainder counts as a line.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let newline = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| i + self.scanned);
            let line: Vec<u8> = match newline {
                Some(pos) => {
                    self.scanned = 0;
                    self.buf.drain(..=pos).collect()
                }
                None if self.eof && !self.buf.is_empty() => {
                    self.scanned = 0;
                    std::mem::take(&mut self.buf)
                }
                None => {
                    self.scanned = self.buf.len();
                    return None;
                }
            };
            self.line += 1;
            if !line.trim_ascii().is_empty() {
                return Some(line);
            }
        }
    }

    fn too_long(&mut self, len: usize) -> StreamError {
        self.failed = true;
        StreamError::new(format!(
            "line {} is {len} bytes, longer than the {} byte limit",
            self.line + 1,
            self.max_line
        ))
    }
}

/// Decode a chunked byte stream into JSON items, one per line.
///
/// A body error, a malformed line or a line longer than [`MAX_LINE_BYTES`] is yielded
/// once as a [`StreamError`], after which the stream ends.
pub fn decode<T, S, E>(body: S) -> impl Stream<Item = Result<T, StreamError>>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    decode_with_limit(body, MAX_LINE_BYTES)
}

pub fn decode_with_limit<T, S, E>(body: S, max_line: usize) -> impl Stream<Item = Result<T, StreamError>>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let decoder = Decoder {
        body,
        buf: Vec::new(),
        scanned: 0,
        max_line,
        line: 0,
        eof: false,
        failed: false,
    };

    futures::stream::unfold(decoder, |mut decoder| async move {
        if decoder.failed {
            return None;
        }
        loop {
            if let Some(line) = decoder.take_line() {
                let len = line.strip_suffix(b"\n").unwrap_or(&line[..]).len();
                if len > decoder.max_line {
                    decoder.line -= 1;
                    let err = decoder.too_long(len);
                    return Some((Err(err), decoder));
                }
                let item = serde_json::from_slice::<T>(&line).map_err(|e| {
                    decoder.failed = true;
                    StreamError::new(format!("malformed line {}: {e}", decoder.line))
                });
                return Some((item, decoder));
            }
            if decoder.eof {
                return None;
            }
            if decoder.buf.len() > decoder.max_line {
                let err = decoder.too_long(decoder.buf.len());
                return Some((Err(err), decoder));
            }
            match decoder.body.next().await {
                Some(Ok(chunk)) => decoder.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    decoder.failed = true;
                    return Some((Err(StreamError::new(e.to_string())), decoder));
                }
                None => decoder.eof = true,
            }
        }
    })
}
