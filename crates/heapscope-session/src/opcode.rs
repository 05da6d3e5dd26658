//! The protocol's command table.

use std::fmt;

use heapscope_protocol::{CommandSet, CommandStream, ProtocolError};
use serde::{Deserialize, Serialize};

/// Which peer sends a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Visualizer → heap server.
    ToServer,
    /// Heap server → visualizer.
    ToClient,
}

/// Every command either peer can put in a command stream.
///
/// The table is shared by both roles; each role only accepts the commands
/// flowing towards it (see [`Opcode::direction`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    PauseRequest = 1,
    Pause = 2,
    Restart = 3,
    PlayOne = 4,
    ShutdownRequest = 5,
    Shutdown = 6,
    Stream = 7,
    Event = 8,
    Control = 9,
    EventFilters = 10,
    EventCount = 11,
    Summary = 12,
    SpaceInfo = 13,
    Space = 14,
}

impl Opcode {
    /// All opcodes in wire order.
    pub const ALL: [Opcode; 14] = [
        Self::PauseRequest,
        Self::Pause,
        Self::Restart,
        Self::PlayOne,
        Self::ShutdownRequest,
        Self::Shutdown,
        Self::Stream,
        Self::Event,
        Self::Control,
        Self::EventFilters,
        Self::EventCount,
        Self::Summary,
        Self::SpaceInfo,
        Self::Space,
    ];

    /// The validated dispatch table for this command set.
    pub fn table() -> Result<CommandStream<Opcode>, ProtocolError> {
        CommandStream::new(Self::ALL)
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::PauseRequest
            | Self::Restart
            | Self::PlayOne
            | Self::ShutdownRequest
            | Self::EventFilters => Direction::ToServer,
            Self::Pause
            | Self::Shutdown
            | Self::Stream
            | Self::Event
            | Self::Control
            | Self::EventCount
            | Self::Summary
            | Self::SpaceInfo
            | Self::Space => Direction::ToClient,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PauseRequest => "pause-request",
            Self::Pause => "pause",
            Self::Restart => "restart",
            Self::PlayOne => "play-one",
            Self::ShutdownRequest => "shutdown-request",
            Self::Shutdown => "shutdown",
            Self::Stream => "stream",
            Self::Event => "event",
            Self::Control => "control",
            Self::EventFilters => "event-filters",
            Self::EventCount => "event-count",
            Self::Summary => "summary",
            Self::SpaceInfo => "space-info",
            Self::Space => "space",
        }
    }
}

impl CommandSet for Opcode {
    fn opcode(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
