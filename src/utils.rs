//! Streaming utilities for the generation protocol's JSON-lines wire format.
//!
//! Unlike an SSE API, the generation protocol frames each streamed message as
//! one complete JSON object terminated by a newline — no `data: ` prefix, no
//! `[DONE]` sentinel. A `done:true` frame is the only end-of-stream marker;
//! the client is responsible for noticing a socket close that happens before
//! one arrives (see [`crate::error::Error::Truncated`]).
//!
//! HTTP chunk boundaries never align with line boundaries, so [`LineSplitter`]
//! buffers partial lines across chunks and only ever yields complete ones.
//! Keeping that buffering logic free of `reqwest`/`tokio` lets it be tested
//! directly with plain byte slices instead of a mock HTTP server.

use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;

/// Incrementally reassembles newline-terminated lines from arbitrarily
/// chunked byte slices. Blank lines (including whitespace-only ones) are
/// swallowed rather than yielded.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every complete, non-blank line it
    /// completed. Bytes that don't yet form a full line are retained for the
    /// next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }

    /// True if bytes remain in the buffer that never reached a newline —
    /// i.e. the stream closed mid-line.
    pub fn has_dangling_partial(&self) -> bool {
        !self.buffer.trim().is_empty()
    }
}

/// Parses a raw HTTP streaming response into a stream of deserialized
/// JSON-lines frames of type `T`, using [`LineSplitter`] to reassemble lines
/// split across chunk boundaries.
pub fn parse_json_lines<T>(response: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<T>> + Send>>
where
    T: DeserializeOwned + Send + 'static,
{
    let stream = futures::stream::unfold(
        (response.bytes_stream(), LineSplitter::new(), Vec::<String>::new().into_iter()),
        |(mut bytes_stream, mut splitter, mut pending)| async move {
            loop {
                if let Some(line) = pending.next() {
                    let parsed = serde_json::from_str::<T>(&line)
                        .map_err(|e| Error::protocol(format!("malformed stream frame: {e}")));
                    return Some((parsed, (bytes_stream, splitter, pending)));
                }

                match bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        pending = splitter.feed(&chunk).into_iter();
                    }
                    Some(Err(e)) => {
                        return Some((Err(Error::Http(e)), (bytes_stream, splitter, pending)));
                    }
                    None => return None,
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_complete_lines_in_one_chunk() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"a\":2}"]);
        assert!(!splitter.has_dangling_partial());
    }

    #[test]
    fn test_reassembles_line_split_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"{\"a\":").is_empty());
        let lines = splitter.feed(b"1}\n");
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_tolerates_leading_and_interleaved_blank_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"\n\n  \n{\"a\":1}\n\n{\"a\":2}\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[test]
    fn test_trailing_whitespace_on_line_is_trimmed() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"{\"a\":1}   \n");
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_dangling_partial_detected_without_trailing_newline() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"{\"a\":1}\n{\"partial");
        assert_eq!(lines, vec!["{\"a\":1}"]);
        assert!(splitter.has_dangling_partial());
    }

    #[test]
    fn test_no_dangling_partial_on_clean_close() {
        let mut splitter = LineSplitter::new();
        splitter.feed(b"{\"a\":1}\n");
        assert!(!splitter.has_dangling_partial());
    }
}
