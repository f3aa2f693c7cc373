//! Protocol module containing wire tokens, the secure frame codec, stream
//! framing, and the command vocabulary.

pub mod buffer;
pub mod command;
pub mod frame;
pub mod tokens;

pub use buffer::{FrameBuffer, FrameBufferError};
pub use command::{Command, CommandError, InputCommand, SpecialKey};
pub use frame::{decode, decode_line, encode, FrameError, SecureFrame};
