use heapscope_model::ModelError;
use heapscope_protocol::ProtocolError;
use heapscope_transport::TransportError;

use crate::{Opcode, SessionState};

/// Errors that can occur while establishing or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer is not speaking this protocol (wrong magic string or
    /// endianness marker). Nothing past the handshake is exchanged.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// A command referred to a space that was never bootstrapped.
    #[error("unknown space {0}")]
    UnknownSpace(u8),

    /// A command referred to a stream its space does not have.
    #[error("unknown stream {stream} in space {space}")]
    UnknownStream { space: u8, stream: u8 },

    /// An event ID outside the event list sent at bootstrap.
    #[error("unknown event {event} ({count} events defined)")]
    UnknownEvent { event: u8, count: usize },

    /// A command only meaningful in the other direction.
    #[error("unexpected {0} command")]
    UnexpectedCommand(Opcode),

    /// The session state machine refused a transition.
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// A recorded trace has no more payloads.
    #[error("trace exhausted after {0} payload(s)")]
    TraceExhausted(usize),
}
