//! Unified error type for heapscope.

use heapscope_model::ModelError;
use heapscope_protocol::ProtocolError;
use heapscope_session::SessionError;
use heapscope_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Drivers and visualizers built on the `heapscope` crate deal with this
/// single type; the `#[from]` conversions let `?` lift sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum HeapscopeError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed bytes or command stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An entity failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Handshake, bootstrap or command dispatch failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An event ID outside the server's event list.
    #[error("unknown event {event} ({count} events defined)")]
    UnknownEvent { event: u8, count: usize },

    /// The receiver of visualizer notifications was dropped.
    #[error("notification channel closed")]
    NotificationChannelClosed,
}
