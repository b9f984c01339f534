//! Incremental SSE (Server-Sent Events) decoding.
//!
//! [`SseDecoder`] is a pure line-accumulating state machine so framing can
//! be tested without I/O; [`data_frames`] adapts a `reqwest::Response` body
//! into a `Stream` of completed `data:` payloads, reading bytes only when
//! the consumer polls.

use futures::Stream;
use tokio_stream::StreamExt;

/// Accumulates byte chunks and yields one string per completed SSE frame
/// (the joined `data:` lines). Event names, ids, comments, and unknown
/// fields are consumed and discarded; this protocol carries everything in
/// `data:`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns the payloads of every frame the
    /// chunk completed, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos]
                .trim_end_matches('\r')
                .to_string();
            self.buffer.drain(..=newline_pos);

            if line.is_empty() {
                // Blank line dispatches the accumulated frame.
                if !self.data_lines.is_empty() {
                    frames.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data_lines.push(value.trim_start().to_string());
            }
            // event:, id:, retry: and unknown fields are ignored.
        }
        frames
    }

    /// Flush the final frame when the body ends without a trailing blank
    /// line.
    pub fn finish(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            None
        } else {
            let payload = self.data_lines.join("\n");
            self.data_lines.clear();
            Some(payload)
        }
    }
}

struct FrameState {
    body: std::pin::Pin<
        Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
    >,
    decoder: SseDecoder,
    ready: std::collections::VecDeque<String>,
    done: bool,
}

/// Decode a streaming response body into `data:` payloads, lazily.
pub fn data_frames(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<String>> + Send {
    futures::stream::unfold(
        FrameState {
            body: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            ready: std::collections::VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(payload) = state.ready.pop_front() {
                    return Some((Ok(payload), state));
                }
                if state.done {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        state.ready.extend(state.decoder.feed(&chunk));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(payload) = state.decoder.finish() {
                            state.ready.push_back(payload);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: {\"type\":\"start\"}\n\n");
        assert_eq!(frames, vec![r#"{"type":"start"}"#]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":").is_empty());
        assert!(decoder.feed(b"\"finish\"}").is_empty());
        let frames = decoder.feed(b"\n\n");
        assert_eq!(frames, vec![r#"{"type":"finish"}"#]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\r\ndata: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(frames, vec!["one", "two"]);
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(frames, vec!["first\nsecond"]);
    }

    #[test]
    fn test_event_and_id_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: update\nid: 7\ndata: payload\n\n");
        assert_eq!(frames, vec!["payload"]);
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail\n").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.finish(), None);
    }
}
