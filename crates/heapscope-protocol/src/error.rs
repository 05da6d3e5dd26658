//! Error types for the protocol layer.
//!
//! Every codec and dispatch failure is fatal to the frame being processed.
//! Nothing here is retried: a capacity error means the buffer was sized
//! too small for the payload or the two peers disagree on the layout, and
//! a framing error means the frame itself is malformed.

/// Errors that can occur while encoding, decoding, or dispatching a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A read or write would run past the end of the buffer.
    ///
    /// `len` is the buffer's declared length: the frame length when
    /// decoding, the buffer capacity when encoding. The cursor is left
    /// where it was before the failed operation.
    #[error("buffer capacity exceeded, buffer length = {len}")]
    Capacity { len: usize },

    /// The command-stream envelope is malformed.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A string cannot be represented on the wire.
    ///
    /// Strings are NUL-terminated, so an embedded NUL cannot be written;
    /// on the read side the bytes must be valid UTF-8.
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// A command table was registered with gaps, duplicates, or opcodes
    /// outside the usable range.
    #[error("invalid command table: {0}")]
    InvalidCommandTable(String),

    /// A value decoded fine but violates a protocol rule (for example a
    /// negative array length).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// A command-stream envelope violation.
///
/// Kept separate from [`ProtocolError`] so tests and callers can match on
/// the exact reason a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// The first four bytes were not `MAGIC_START`.
    #[error("wrong first magic number: {0}")]
    BadStartMagic(i32),

    /// The four bytes after the end-of-stream opcode were not `MAGIC_END`.
    #[error("wrong second magic number: {0}")]
    BadEndMagic(i32),

    /// An opcode was negative or above the highest registered command.
    #[error("command out of bounds: {0}")]
    OpcodeOutOfRange(i8),

    /// Bytes were left in the frame after `MAGIC_END`.
    #[error("{0} unconsumed byte(s) after end of stream")]
    TrailingBytes(usize),
}
