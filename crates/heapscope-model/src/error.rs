//! Error types for the entity model.

use heapscope_protocol::ProtocolError;

use crate::DataType;

/// Errors that can occur while building, mutating, or (de)serializing
/// heap entities.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The underlying codec failed (capacity, strings, framing).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A data-type byte outside `0..=2`.
    #[error("unknown data type {0}")]
    UnknownDataType(i8),

    /// A presentation byte outside `0..=5`.
    #[error("unknown presentation style {0}")]
    UnknownPresentation(i8),

    /// A paint-style byte outside `0..=1`.
    #[error("unknown paint style {0}")]
    UnknownPaintStyle(i8),

    /// A count or identifier decoded as a negative number.
    #[error("negative {what}: {value}")]
    Negative { what: &'static str, value: i64 },

    /// More items than the wire field can carry.
    #[error("too many {what}: {count} (max {max})")]
    TooMany {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// An event filter value outside its declared bounds.
    #[error("{field} {value} out of bounds [{min}, {max}]")]
    FilterOutOfBounds {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    /// An index past the end of a collection.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// An array whose length does not fit the space it belongs to.
    #[error("{what} length {actual} does not match {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Stream data of the wrong storage width.
    #[error("expected {expected} data, got {actual}")]
    DataTypeMismatch { expected: DataType, actual: DataType },
}
