//! Incremental decoder for the chat function's event stream.
//!
//! One decoder instance per stream. Raw byte chunks go in, visible-text
//! deltas come out; the two upstream frame schemas and heartbeat noise are
//! hidden from the caller.

use tracing::trace;

use meera_shared::protocol::StreamFrame;

/// End-of-stream sentinel carried in a `data:` field.
const DONE_SENTINEL: &str = "[DONE]";

/// Streaming frame decoder.
///
/// Holds no cross-call state beyond the current byte buffer and the last
/// cumulative snapshot, so a transport error mid-stream cannot corrupt
/// anything the caller already received.
pub struct ChunkDecoder {
    buffer: Vec<u8>,
    /// Full answer last seen from the cumulative-snapshot upstream shape.
    snapshot: String,
    finish_reason: Option<String>,
    done: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            snapshot: String::new(),
            finish_reason: None,
            done: false,
        }
    }

    /// Feed one raw chunk and return the text deltas it completed.
    ///
    /// CR bytes are dropped on ingest so CRLF and LF framing decode the same
    /// way; frames are split on blank lines; the trailing possibly-incomplete
    /// fragment stays buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut deltas = Vec::new();
        while let Some(pos) = self
            .buffer
            .windows(2)
            .position(|separator| separator == b"\n\n")
        {
            let rest = self.buffer.split_off(pos + 2);
            let frame_bytes = std::mem::replace(&mut self.buffer, rest);
            let frame = String::from_utf8_lossy(&frame_bytes[..pos]).into_owned();
            self.decode_frame(&frame, &mut deltas);
        }
        deltas
    }

    /// End-of-stream flush. A buffered partial frame is keepalive noise,
    /// not content, and is discarded.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            trace!(len = self.buffer.len(), "discarding partial trailing frame");
            self.buffer.clear();
        }
        self.done = true;
    }

    /// Whether the upstream signalled end-of-stream.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Finish reason reported by the upstream, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    fn decode_frame(&mut self, frame: &str, out: &mut Vec<String>) {
        for line in frame.lines() {
            // Leading-colon lines are comments / keepalive heartbeats.
            if line.starts_with(':') {
                continue;
            }
            let Some(value) = line.strip_prefix("data:") else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if value == DONE_SENTINEL {
                self.done = true;
                continue;
            }
            self.decode_payload(value, out);
        }
    }

    fn decode_payload(&mut self, value: &str, out: &mut Vec<String>) {
        match serde_json::from_str::<StreamFrame>(value) {
            Ok(StreamFrame::Incremental { choices }) => {
                for choice in choices {
                    if let Some(reason) = choice.finish_reason {
                        self.finish_reason = Some(reason);
                    }
                    // `delta.reasoning` is thought content and never
                    // reaches the transcript.
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            out.push(text);
                        }
                    }
                }
            }
            Ok(StreamFrame::Snapshot {
                answer,
                done,
                thought: _,
            }) => {
                if done {
                    self.done = true;
                }
                let delta = if answer.starts_with(&self.snapshot) {
                    answer[self.snapshot.len()..].to_string()
                } else {
                    // Non-monotonic upstream correction: the whole new
                    // snapshot is the delta.
                    answer.clone()
                };
                self.snapshot = answer;
                if !delta.is_empty() {
                    out.push(delta);
                }
            }
            Err(e) => {
                trace!(error = %e, "skipping unparseable stream frame");
            }
        }
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut ChunkDecoder, chunks: &[&str]) -> String {
        let mut all = String::new();
        for chunk in chunks {
            for delta in decoder.push(chunk.as_bytes()) {
                all.push_str(&delta);
            }
        }
        all
    }

    #[test]
    fn incremental_shape_accumulates() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );
        assert_eq!(text, "Hi there");
        assert!(decoder.is_done());
    }

    #[test]
    fn snapshot_shape_strips_seen_prefix() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &[
                "data: {\"answer\":\"Hi\"}\n\n",
                "data: {\"answer\":\"Hi there\"}\n\n",
                "data: {\"answer\":\"Hi there!\",\"done\":true}\n\n",
            ],
        );
        assert_eq!(text, "Hi there!");
        assert!(decoder.is_done());
    }

    #[test]
    fn snapshot_correction_replaces_wholesale() {
        let mut decoder = ChunkDecoder::new();
        let mut deltas = decoder.push(b"data: {\"answer\":\"draft one\"}\n\n");
        deltas.extend(decoder.push(b"data: {\"answer\":\"actually no\"}\n\n"));
        assert_eq!(deltas, vec!["draft one", "actually no"]);
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &[
                "data: {\"choices\":[{\"delta\":{\"co",
                "ntent\":\"abc\"}}]}\n",
                "\ndata: {\"choices\":[{\"delta\":{\"content\":\"def\"}}]}\n\n",
            ],
        );
        assert_eq!(text, "abcdef");
    }

    #[test]
    fn crlf_framing_decodes_like_lf() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &["data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n\r\n"],
        );
        assert_eq!(text, "ok");
    }

    #[test]
    fn heartbeats_and_garbage_are_skipped() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &[
                ": keepalive\n\n",
                "data: not json at all\n\n",
                "event: something\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
            ],
        );
        assert_eq!(text, "x");
    }

    #[test]
    fn reasoning_never_reaches_the_transcript() {
        let mut decoder = ChunkDecoder::new();
        let text = collect(
            &mut decoder,
            &[
                "data: {\"choices\":[{\"delta\":{\"reasoning\":\"pondering...\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"answer\",\"reasoning\":\"more\"}}]}\n\n",
            ],
        );
        assert_eq!(text, "answer");
    }

    #[test]
    fn finish_reason_is_captured() {
        let mut decoder = ChunkDecoder::new();
        decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"end\"},\"finish_reason\":\"stop\"}]}\n\n",
        );
        assert_eq!(decoder.finish_reason(), Some("stop"));
    }

    #[test]
    fn partial_trailing_frame_is_discarded() {
        let mut decoder = ChunkDecoder::new();
        let deltas = decoder.push(b"data: {\"answer\":\"half");
        assert!(deltas.is_empty());
        decoder.finish();
        assert!(decoder.is_done());
        // A fresh push after finish would see an empty buffer.
        assert!(decoder.push(b"").is_empty());
    }
}
