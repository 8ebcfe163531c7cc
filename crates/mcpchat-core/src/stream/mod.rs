//! Line-framed streaming protocol
//!
//! ```text
//! f:{"messageId":"msg-..."}
//! 0:"Hello"
//! 0:" world"
//! d:{"finishReason":"stop","usage":{"promptTokens":null,"completionTokens":null}}
//! ```

mod frame;
mod framer;
mod sink;

pub use frame::{parse_frames, Frame, FrameError, FrameResult};
pub use framer::{generate_message_id, MessageFramer};
pub use sink::{BufferSink, ChannelSink, FrameSink};
