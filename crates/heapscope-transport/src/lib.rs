//! Transport layer for heapscope.
//!
//! Moves opaque payloads between a heap server and a visualizer as
//! length-prefixed frames:
//!
//! ```text
//! int32 (big-endian) length | length payload bytes
//! ```
//!
//! - [`FrameWriter`] owns a fixed-capacity send buffer; callers encode into
//!   it and then mark how many bytes to send.
//! - [`FrameReader`] reassembles frames from arbitrarily split socket reads
//!   and keeps any bytes of the following frame for the next call.
//! - [`TcpTransport`] accepts connections; [`connect`] opens one.

#![allow(async_fn_in_trait)]

mod error;
mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::{FrameReader, FrameWriter, FramedConnection, LENGTH_PREFIX_SIZE};
pub use tcp::{connect, TcpConnection, TcpTransport};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default maximum frame length: 4 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Buffer sizing shared by both ends of a connection.
///
/// The send and receive buffers hold exactly `max_frame_len` bytes and are
/// reused for every frame; the reassembly buffer holds twice that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Largest payload a single frame may carry.
    pub max_frame_len: usize,
}

impl FrameConfig {
    /// The largest length a signed 32-bit prefix can declare.
    pub const MAX_FRAME_LEN: usize = i32::MAX as usize;

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Checks that frames of `max_frame_len` bytes are non-empty and
    /// expressible in the length prefix.
    pub fn validate(&self) -> Result<(), TransportError> {
        if (1..=Self::MAX_FRAME_LEN).contains(&self.max_frame_len) {
            Ok(())
        } else {
            Err(TransportError::InvalidMaxFrameLength(self.max_frame_len))
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<std::net::SocketAddr, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_default_frame_config_is_four_mib() {
        assert_eq!(FrameConfig::default().max_frame_len, 4 * 1024 * 1024);
    }

    #[test]
    fn test_frame_config_bounds() {
        assert!(FrameConfig::default().validate().is_ok());
        assert!(FrameConfig::with_max_frame_len(1).validate().is_ok());
        assert!(FrameConfig::with_max_frame_len(FrameConfig::MAX_FRAME_LEN)
            .validate()
            .is_ok());
        assert!(matches!(
            FrameConfig::with_max_frame_len(0).validate(),
            Err(TransportError::InvalidMaxFrameLength(0))
        ));
        let too_long = FrameConfig::MAX_FRAME_LEN + 1;
        assert!(matches!(
            FrameConfig::with_max_frame_len(too_long).validate(),
            Err(TransportError::InvalidMaxFrameLength(n)) if n == too_long
        ));
    }
}
