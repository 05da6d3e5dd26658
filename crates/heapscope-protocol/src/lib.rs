//! Wire protocol primitives for heapscope.
//!
//! This crate defines how heap snapshots are turned into bytes and back:
//!
//! - **Codec** ([`Encoder`], [`Decoder`], [`Rgb`]): typed, bounds-checked
//!   reads and writes of primitive values over a fixed-capacity buffer.
//! - **Command streams** ([`CommandStream`], [`CommandSet`]): a payload
//!   wrapped in magic sentinels, carrying a sequence of single-byte opcodes
//!   each followed by its own encoded arguments.
//! - **Errors** ([`ProtocolError`], [`FramingError`]): what can go wrong
//!   while encoding, decoding, or dispatching.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (length-prefixed frames)
//! and the entity model. It knows nothing about sockets or heap spaces:
//! it only knows how to lay out values inside one frame.
//!
//! ```text
//! Transport (frames) → Protocol (Decoder + opcodes) → Session (entities)
//! ```

mod codec;
mod command;
mod error;

pub use codec::{Decoder, Encoder, Rgb};
pub use command::{
    finish_stream, put_command, start_stream, CommandSet, CommandStream,
    END_OF_STREAM, FIRST_COMMAND, MAGIC_END, MAGIC_START,
};
pub use error::{FramingError, ProtocolError};
