//! Newline-delimited frame decoding for the model backend response body.
//!
//! Ollama streams one JSON object per line.  The body arrives as arbitrary
//! byte chunks, so a frame — or a multi-byte UTF-8 sequence inside one — may
//! be split across reads.  [`FrameDecoder`] buffers raw bytes until a
//! delimiter is seen and only then decodes, which reassembles both kinds of
//! split before any parsing happens.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One decoded frame of the backend chat stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatFrame {
    /// Incremental message payload.  Absent on pure status frames.
    #[serde(default)]
    pub message: Option<FrameMessage>,

    /// `true` on the frame that ends the turn.
    #[serde(default)]
    pub done: bool,
}

/// The `message` object inside a frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameMessage {
    /// Role of the streaming message (normally `assistant`).
    #[serde(default)]
    pub role: Option<String>,

    /// Content delta carried by this frame.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<RawToolCall>,
}

/// A tool call in backend wire form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToolCall {
    /// Backend-assigned id, if any.
    #[serde(default)]
    pub id: Option<String>,

    /// The function payload.
    pub function: RawFunction,
}

/// The `function` object of a wire tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFunction {
    /// Tool name.
    pub name: String,

    /// Arguments — object form or pre-serialized string, depending on the
    /// backend build.
    #[serde(default)]
    pub arguments: Option<Value>,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Incremental splitter from response bytes to [`ChatFrame`]s.
///
/// Feed each read with [`push`](Self::push); call [`finish`](Self::finish)
/// at end of stream to flush trailing bytes after the last delimiter.
/// Malformed frame content fails the stream — frames are never silently
/// skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes and return the frames it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<ChatFrame>> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            frames.push(decode_frame(line)?);
        }
        Ok(frames)
    }

    /// End of stream: decode any bytes after the last delimiter as a final
    /// frame.
    pub fn finish(&mut self) -> Result<Option<ChatFrame>> {
        let rest = std::mem::take(&mut self.buf);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        decode_frame(&rest).map(Some)
    }
}

/// Decode one complete frame line.
fn decode_frame(line: &[u8]) -> Result<ChatFrame> {
    let text = std::str::from_utf8(line).map_err(|e| AgentError::Frame {
        reason: format!("invalid UTF-8 in frame: {e}"),
    })?;
    serde_json::from_str(text.trim()).map_err(|e| AgentError::Frame {
        reason: format!("invalid JSON frame: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_frame_per_push() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(b"{\"message\":{\"role\":\"assistant\",\"content\":\"hi\"},\"done\":false}\n")
            .unwrap();
        assert_eq!(frames.len(), 1);
        let message = frames[0].message.as_ref().unwrap();
        assert_eq!(message.content.as_deref(), Some("hi"));
        assert!(!frames[0].done);
    }

    #[test]
    fn frame_split_across_reads_is_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"{\"message\":{\"conte").unwrap().is_empty());
        let frames = decoder
            .push(b"nt\":\"split\"},\"done\":false}\n")
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].message.as_ref().unwrap().content.as_deref(),
            Some("split")
        );
    }

    #[test]
    fn multibyte_char_split_across_reads_survives() {
        let line = "{\"message\":{\"content\":\"héllo\"},\"done\":false}\n".as_bytes();
        // Split in the middle of the two-byte `é`.
        let split = line.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&line[..split]).unwrap().is_empty());
        let frames = decoder.push(&line[split..]).unwrap();
        assert_eq!(
            frames[0].message.as_ref().unwrap().content.as_deref(),
            Some("héllo")
        );
    }

    #[test]
    fn multiple_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(b"{\"done\":false}\n{\"done\":true}\n")
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(!frames[0].done);
        assert!(frames[1].done);
    }

    #[test]
    fn trailing_bytes_flushed_at_end_of_stream() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"{\"done\":true}").unwrap().is_empty());
        let last = decoder.finish().unwrap().unwrap();
        assert!(last.done);
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"\n  \n{\"done\":true}\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn malformed_frame_fails_the_stream() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.push(b"{not json}\n").unwrap_err();
        assert!(matches!(err, AgentError::Frame { .. }), "got {err:?}");
    }

    #[test]
    fn invalid_utf8_fails_the_stream() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.push(b"\xff\xfe\n").unwrap_err();
        assert!(matches!(err, AgentError::Frame { .. }), "got {err:?}");
    }

    #[test]
    fn tool_call_frame_decodes_object_arguments() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(
                br#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"bash","arguments":{"cmd":"ls"}}}]},"done":true}
"#,
            )
            .unwrap();
        let message = frames[0].message.as_ref().unwrap();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].function.name, "bash");
        assert_eq!(
            message.tool_calls[0].function.arguments.as_ref().unwrap()["cmd"],
            "ls"
        );
        assert!(frames[0].done);
    }
}
