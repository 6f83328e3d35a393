//! Frontend/backend protocol, version 3.
//!
//! Every frame after startup is a one-byte tag followed by a big-endian
//! `int32` length that counts itself but not the tag. The startup packet has
//! no tag.

mod messages;
mod reader;
mod writer;

pub use messages::*;
pub use reader::{DecodeError, MAX_FRAME, MessageReader, decode};
pub use writer::MessageWriter;
