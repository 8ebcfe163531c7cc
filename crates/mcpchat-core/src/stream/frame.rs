//! Wire frames
//!
//! Each frame is one line, `<tag>:<json>\n`:
//!
//! | tag | frame | payload |
//! |-----|-------|---------|
//! | `f` | start | `{"messageId":"msg-..."}` |
//! | `0` | delta | JSON string |
//! | `d` | end   | `{"finishReason":"stop","usage":{"promptTokens":..,"completionTokens":..}}` |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FinishReason, Usage};

/// Framing errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame has no tag separator")]
    MissingSeparator,

    #[error("Unknown frame tag: {0}")]
    UnknownTag(String),

    #[error("Invalid frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream closed by the client")]
    Closed,

    #[error("Frame out of order: {0}")]
    OutOfOrder(&'static str),
}

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    message_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndPayload {
    finish_reason: FinishReason,
    #[serde(default)]
    usage: Usage,
}

/// One line of the streaming protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Start { message_id: String },
    Delta(String),
    End { finish_reason: FinishReason, usage: Usage },
}

impl Frame {
    pub const START_TAG: &'static str = "f";
    pub const DELTA_TAG: &'static str = "0";
    pub const END_TAG: &'static str = "d";

    pub fn tag(&self) -> &'static str {
        match self {
            Frame::Start { .. } => Self::START_TAG,
            Frame::Delta(_) => Self::DELTA_TAG,
            Frame::End { .. } => Self::END_TAG,
        }
    }

    /// Encode as a newline-terminated line
    pub fn encode(&self) -> FrameResult<String> {
        let payload = match self {
            Frame::Start { message_id } => serde_json::to_string(&StartPayload {
                message_id: message_id.clone(),
            })?,
            Frame::Delta(text) => serde_json::to_string(text)?,
            Frame::End { finish_reason, usage } => serde_json::to_string(&EndPayload {
                finish_reason: *finish_reason,
                usage: *usage,
            })?,
        };
        Ok(format!("{}:{}\n", self.tag(), payload))
    }

    /// Decode one line; the trailing newline is optional
    pub fn parse(line: &str) -> FrameResult<Frame> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (tag, payload) = line.split_once(':').ok_or(FrameError::MissingSeparator)?;
        match tag {
            Self::START_TAG => {
                let start: StartPayload = serde_json::from_str(payload)?;
                Ok(Frame::Start {
                    message_id: start.message_id,
                })
            }
            Self::DELTA_TAG => Ok(Frame::Delta(serde_json::from_str(payload)?)),
            Self::END_TAG => {
                let end: EndPayload = serde_json::from_str(payload)?;
                Ok(Frame::End {
                    finish_reason: end.finish_reason,
                    usage: end.usage,
                })
            }
            other => Err(FrameError::UnknownTag(other.to_string())),
        }
    }

    pub fn as_delta(&self) -> Option<&str> {
        match self {
            Frame::Delta(text) => Some(text),
            _ => None,
        }
    }
}

/// Parse a whole response body into frames
pub fn parse_frames(body: &str) -> FrameResult<Vec<Frame>> {
    body.lines()
        .filter(|l| !l.is_empty())
        .map(Frame::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_wire_format() {
        let start = Frame::Start {
            message_id: "msg-1".into(),
        };
        assert_eq!(start.encode().unwrap(), "f:{\"messageId\":\"msg-1\"}\n");

        let delta = Frame::Delta("say \"hi\"\nthen".into());
        assert_eq!(delta.encode().unwrap(), "0:\"say \\\"hi\\\"\\nthen\"\n");

        let end = Frame::End {
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        };
        assert_eq!(
            end.encode().unwrap(),
            "d:{\"finishReason\":\"stop\",\"usage\":{\"promptTokens\":null,\"completionTokens\":null}}\n"
        );
    }

    #[test]
    fn test_parse_accepts_encoded_lines() {
        let end = Frame::End {
            finish_reason: FinishReason::ToolCalls,
            usage: Usage {
                prompt_tokens: Some(3),
                completion_tokens: None,
            },
        };
        assert_eq!(Frame::parse(&end.encode().unwrap()).unwrap(), end);
        assert_eq!(
            Frame::parse("0:\"a:b\"").unwrap(),
            Frame::Delta("a:b".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(matches!(Frame::parse("no separator"), Err(FrameError::MissingSeparator)));
        assert!(matches!(Frame::parse("9:{}"), Err(FrameError::UnknownTag(t)) if t == "9"));
        assert!(matches!(Frame::parse("0:not json"), Err(FrameError::Json(_))));
    }

    #[test]
    fn test_parse_frames_skips_blank_lines() {
        let body = "f:{\"messageId\":\"m\"}\n0:\"x\"\n\nd:{\"finishReason\":\"stop\"}\n";
        let frames = parse_frames(body).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].as_delta(), Some("x"));
        assert!(matches!(frames[2], Frame::End { usage, .. } if usage == Usage::default()));
    }
}
