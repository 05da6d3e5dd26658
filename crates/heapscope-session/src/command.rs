//! Typed commands and their payloads.
//!
//! Every command after bootstrap travels alone in a command stream of its
//! own frame:
//!
//! ```text
//! int 666666 | opcode | payload | 0 | int -666
//! ```
//!
//! | command          | payload                                          |
//! |------------------|--------------------------------------------------|
//! | stream           | ubyte space, ubyte stream, typed array           |
//! | event            | byte event, int elapsed, int compensation        |
//! | control          | byte space, byte array                           |
//! | event-filters    | event filters                                    |
//! | event-count      | int array                                        |
//! | summary          | byte space, byte stream, int array               |
//! | space-info       | byte space, string                               |
//! | space            | space                                            |
//!
//! The flow commands (pause, restart, play-one, shutdown and their
//! requests) carry no payload.

use heapscope_model::{Control, EventFilters, Space, StreamData};
use heapscope_protocol::{finish_stream, put_command, start_stream, Decoder, Encoder};

use crate::{Direction, Heap, Opcode, OutputGenerator, SessionError};

/// An outgoing command, borrowing whatever it sends.
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    PauseRequest,
    Pause,
    Restart,
    PlayOne,
    ShutdownRequest,
    Shutdown,
    /// The first `count` values of a stream's data.
    Stream {
        space: u8,
        stream: u8,
        data: &'a StreamData,
        count: usize,
    },
    Event {
        event: u8,
        elapsed: i32,
        compensation: i32,
    },
    Control {
        space: u8,
        control: &'a [Control],
    },
    EventFilters(&'a EventFilters),
    EventCount(&'a [i32]),
    Summary {
        space: u8,
        stream: u8,
        summary: &'a [i32],
    },
    SpaceInfo {
        space: u8,
        info: &'a str,
    },
    Space(&'a Space),
}

impl Command<'_> {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::PauseRequest => Opcode::PauseRequest,
            Self::Pause => Opcode::Pause,
            Self::Restart => Opcode::Restart,
            Self::PlayOne => Opcode::PlayOne,
            Self::ShutdownRequest => Opcode::ShutdownRequest,
            Self::Shutdown => Opcode::Shutdown,
            Self::Stream { .. } => Opcode::Stream,
            Self::Event { .. } => Opcode::Event,
            Self::Control { .. } => Opcode::Control,
            Self::EventFilters(_) => Opcode::EventFilters,
            Self::EventCount(_) => Opcode::EventCount,
            Self::Summary { .. } => Opcode::Summary,
            Self::SpaceInfo { .. } => Opcode::SpaceInfo,
            Self::Space(_) => Opcode::Space,
        }
    }

    /// Writes a complete single-command stream.
    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), SessionError> {
        start_stream(out)?;
        put_command(out, self.opcode())?;
        self.encode_payload(out)?;
        finish_stream(out)?;
        Ok(())
    }

    fn encode_payload(&self, out: &mut Encoder<'_>) -> Result<(), SessionError> {
        match *self {
            Self::PauseRequest
            | Self::Pause
            | Self::Restart
            | Self::PlayOne
            | Self::ShutdownRequest
            | Self::Shutdown => {}
            Self::Stream {
                space,
                stream,
                data,
                count,
            } => {
                out.write_ubyte(space)?;
                out.write_ubyte(stream)?;
                data.encode(out, count)?;
            }
            Self::Event {
                event,
                elapsed,
                compensation,
            } => {
                out.write_ubyte(event)?;
                out.write_int(elapsed)?;
                out.write_int(compensation)?;
            }
            Self::Control { space, control } => {
                out.write_ubyte(space)?;
                out.write_byte_array(&Control::to_wire(control))?;
            }
            Self::EventFilters(filters) => filters.encode(out)?,
            Self::EventCount(counts) => out.write_int_array(counts)?,
            Self::Summary {
                space,
                stream,
                summary,
            } => {
                out.write_ubyte(space)?;
                out.write_ubyte(stream)?;
                out.write_int_array(summary)?;
            }
            Self::SpaceInfo { space, info } => {
                out.write_ubyte(space)?;
                out.write_string(info)?;
            }
            Self::Space(space) => space.encode(out)?,
        }
        Ok(())
    }

    /// Encodes the command into the generator's buffer and publishes it.
    pub async fn send<G: OutputGenerator>(&self, generator: &mut G) -> Result<(), SessionError> {
        let mut out = generator.buffer();
        self.encode(&mut out)?;
        let len = out.len();
        generator.done(len).await?;
        tracing::trace!(command = %self.opcode(), len, "command sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Received commands
// ---------------------------------------------------------------------------

/// A command decoded from a command stream, owning its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedCommand {
    PauseRequest,
    Pause,
    Restart,
    PlayOne,
    ShutdownRequest,
    Shutdown,
    Stream {
        space: u8,
        stream: u8,
        data: StreamData,
    },
    Event {
        event: u8,
        elapsed: i32,
        compensation: i32,
    },
    Control {
        space: u8,
        control: Vec<Control>,
    },
    EventFilters(EventFilters),
    EventCount(Vec<i32>),
    Summary {
        space: u8,
        stream: u8,
        summary: Vec<i32>,
    },
    SpaceInfo {
        space: u8,
        info: String,
    },
    Space(Space),
}

impl ReceivedCommand {
    /// Decodes the payload of `opcode`, whichever direction it flows.
    ///
    /// Stream data is typed by the stream it targets, so the heap as known
    /// so far is needed to read it.
    pub fn decode(
        opcode: Opcode,
        input: &mut Decoder<'_>,
        heap: &Heap,
    ) -> Result<Self, SessionError> {
        match opcode.direction() {
            Direction::ToServer => Self::decode_request(opcode, input),
            Direction::ToClient => Self::decode_update(opcode, input, heap),
        }
    }

    /// Decodes a command a visualizer sends to the server.
    pub fn decode_request(opcode: Opcode, input: &mut Decoder<'_>) -> Result<Self, SessionError> {
        Ok(match opcode {
            Opcode::PauseRequest => Self::PauseRequest,
            Opcode::Restart => Self::Restart,
            Opcode::PlayOne => Self::PlayOne,
            Opcode::ShutdownRequest => Self::ShutdownRequest,
            Opcode::EventFilters => Self::EventFilters(EventFilters::decode(input)?),
            other => return Err(SessionError::UnexpectedCommand(other)),
        })
    }

    /// Decodes a command the server sends to a visualizer.
    pub fn decode_update(
        opcode: Opcode,
        input: &mut Decoder<'_>,
        heap: &Heap,
    ) -> Result<Self, SessionError> {
        Ok(match opcode {
            Opcode::Pause => Self::Pause,
            Opcode::Shutdown => Self::Shutdown,
            Opcode::Stream => {
                let space = input.read_ubyte()?;
                let stream = input.read_ubyte()?;
                let data_type = heap
                    .space(space)?
                    .stream(usize::from(stream))
                    .ok_or(SessionError::UnknownStream { space, stream })?
                    .data_type();
                let data = StreamData::decode(data_type, input)?;
                Self::Stream {
                    space,
                    stream,
                    data,
                }
            }
            Opcode::Event => {
                let event = input.read_ubyte()?;
                let count = heap.events.len();
                if usize::from(event) >= count {
                    return Err(SessionError::UnknownEvent { event, count });
                }
                Self::Event {
                    event,
                    elapsed: input.read_int()?,
                    compensation: input.read_int()?,
                }
            }
            Opcode::Control => Self::Control {
                space: input.read_ubyte()?,
                control: Control::from_wire(&input.read_byte_array()?),
            },
            Opcode::EventCount => Self::EventCount(input.read_int_array()?),
            Opcode::Summary => Self::Summary {
                space: input.read_ubyte()?,
                stream: input.read_ubyte()?,
                summary: input.read_int_array()?,
            },
            Opcode::SpaceInfo => Self::SpaceInfo {
                space: input.read_ubyte()?,
                info: input.read_string()?,
            },
            Opcode::Space => Self::Space(Space::decode(input)?),
            other => return Err(SessionError::UnexpectedCommand(other)),
        })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::PauseRequest => Opcode::PauseRequest,
            Self::Pause => Opcode::Pause,
            Self::Restart => Opcode::Restart,
            Self::PlayOne => Opcode::PlayOne,
            Self::ShutdownRequest => Opcode::ShutdownRequest,
            Self::Shutdown => Opcode::Shutdown,
            Self::Stream { .. } => Opcode::Stream,
            Self::Event { .. } => Opcode::Event,
            Self::Control { .. } => Opcode::Control,
            Self::EventFilters(_) => Opcode::EventFilters,
            Self::EventCount(_) => Opcode::EventCount,
            Self::Summary { .. } => Opcode::Summary,
            Self::SpaceInfo { .. } => Opcode::SpaceInfo,
            Self::Space(_) => Opcode::Space,
        }
    }
}

/// Server side: runs every command in one command stream through
/// `handler`. Commands that only flow towards visualizers are rejected with
/// [`SessionError::UnexpectedCommand`]. Returns the number of commands
/// handled.
pub fn dispatch_to_server<F>(input: &mut Decoder<'_>, mut handler: F) -> Result<usize, SessionError>
where
    F: FnMut(ReceivedCommand) -> Result<(), SessionError>,
{
    let table = Opcode::table()?;
    table.execute(input, |opcode, input: &mut Decoder<'_>| {
        handler(ReceivedCommand::decode_request(opcode, input)?)
    })
}

/// Visualizer side: like [`dispatch_to_server`], decoding payloads against
/// `heap`.
///
/// The handler gets the heap mutably so a command can update the state
/// later commands in the same stream are decoded against.
pub fn dispatch_to_client<F>(
    input: &mut Decoder<'_>,
    heap: &mut Heap,
    mut handler: F,
) -> Result<usize, SessionError>
where
    F: FnMut(ReceivedCommand, &mut Heap) -> Result<(), SessionError>,
{
    let table = Opcode::table()?;
    table.execute(input, |opcode, input: &mut Decoder<'_>| {
        let command = ReceivedCommand::decode_update(opcode, input, heap)?;
        handler(command, heap)
    })
}

#[cfg(test)]
mod tests {
    use heapscope_model::{DataType, Events, StreamSpec};

    use super::*;

    fn heap() -> Heap {
        let mut heap = Heap::new("", Events::new(["Young GC"]));
        let mut space = Space::new("Young", "copying", 3, "Block ", "4K", None, true);
        space
            .add_stream(StreamSpec::new("Used", DataType::Short))
            .unwrap();
        heap.add_space(space).unwrap();
        heap
    }

    fn encode(command: Command<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut out = Encoder::new(&mut buf);
        command.encode(&mut out).unwrap();
        let len = out.len();
        buf.truncate(len);
        buf
    }

    #[test]
    fn test_event_layout() {
        let bytes = encode(Command::Event {
            event: 0,
            elapsed: 120,
            compensation: 30,
        });
        assert_eq!(
            bytes,
            vec![
                0x00, 0x0A, 0x2C, 0x2A, // 666666
                8, 0, 0, 0, 0, 120, 0, 0, 0, 30, // event 0, 120, 30
                0, 0xFF, 0xFF, 0xFD, 0x66, // end, -666
            ]
        );
    }

    #[test]
    fn test_flow_command_has_no_payload() {
        let bytes = encode(Command::PauseRequest);
        assert_eq!(bytes.len(), 4 + 1 + 1 + 4);
        assert_eq!(bytes[4], Opcode::PauseRequest as u8);
    }

    #[test]
    fn test_dispatch_decodes_typed_stream_data() {
        let mut heap = heap();
        let data = StreamData::Short(vec![5, -6, 7]);
        let bytes = encode(Command::Stream {
            space: 0,
            stream: 0,
            data: &data,
            count: 2,
        });

        let mut seen = Vec::new();
        let n = dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |cmd, _| {
            seen.push(cmd);
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            seen,
            vec![ReceivedCommand::Stream {
                space: 0,
                stream: 0,
                data: StreamData::Short(vec![5, -6]),
            }]
        );
    }

    #[test]
    fn test_stream_for_unknown_stream_is_error() {
        let mut heap = heap();
        let data = StreamData::Byte(vec![1]);
        let bytes = encode(Command::Stream {
            space: 0,
            stream: 3,
            data: &data,
            count: 1,
        });
        let err = dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |_, _| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnknownStream {
                space: 0,
                stream: 3
            }
        ));
    }

    #[test]
    fn test_event_outside_event_list_is_error() {
        let mut heap = heap();
        let bytes = encode(Command::Event {
            event: 1,
            elapsed: 0,
            compensation: 0,
        });
        let err = dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, SessionError::UnknownEvent { event: 1, count: 1 }));
    }

    #[test]
    fn test_control_and_space_info_decode() {
        let mut heap = heap();
        let control = [Control::USED, Control::UNUSED | Control::SEPARATOR];
        let mut seen = Vec::new();
        for command in [
            Command::Control {
                space: 0,
                control: &control,
            },
            Command::SpaceInfo {
                space: 0,
                info: "3 regions",
            },
        ] {
            let bytes = encode(command);
            dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |cmd, _| {
                seen.push(cmd);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(
            seen,
            vec![
                ReceivedCommand::Control {
                    space: 0,
                    control: control.to_vec(),
                },
                ReceivedCommand::SpaceInfo {
                    space: 0,
                    info: "3 regions".into(),
                },
            ]
        );
    }

    #[test]
    fn test_space_command_carries_full_description() {
        let mut heap = heap();
        let mut resized = heap.space(0).unwrap().clone();
        resized.resize(5);
        let bytes = encode(Command::Space(&resized));
        dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |cmd, heap| {
            match cmd {
                ReceivedCommand::Space(space) => heap.replace_space(space)?,
                other => panic!("unexpected {other:?}"),
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(heap.space(0).unwrap().tile_count(), 5);
    }

    #[test]
    fn test_invalid_event_filters_rejected() {
        let mut buf = vec![0u8; 64];
        let mut out = Encoder::new(&mut buf);
        start_stream(&mut out).unwrap();
        put_command(&mut out, Opcode::EventFilters).unwrap();
        out.write_short(1).unwrap();
        out.write_bool(true).unwrap();
        out.write_int(0).unwrap();
        out.write_bool(false).unwrap();
        out.write_int(0).unwrap(); // period below minimum
        finish_stream(&mut out).unwrap();
        let len = out.len();
        buf.truncate(len);

        let err = dispatch_to_server(&mut Decoder::new(&buf), |_| Ok(())).unwrap_err();
        assert!(matches!(err, SessionError::Model(_)));
    }

    #[test]
    fn test_each_side_rejects_its_own_commands() {
        let mut heap = heap();
        let bytes = encode(Command::PauseRequest);
        let err = dispatch_to_client(&mut Decoder::new(&bytes), &mut heap, |_, _| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnexpectedCommand(Opcode::PauseRequest)
        ));

        let bytes = encode(Command::Pause);
        let err = dispatch_to_server(&mut Decoder::new(&bytes), |_| Ok(())).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedCommand(Opcode::Pause)));
    }

    #[test]
    fn test_server_decodes_event_filters() {
        let mut filters = EventFilters::new(2);
        filters.set_delay(1, 250).unwrap();
        filters.set_pause(0, true).unwrap();
        let bytes = encode(Command::EventFilters(&filters));

        let mut seen = None;
        dispatch_to_server(&mut Decoder::new(&bytes), |cmd| {
            seen = Some(cmd);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, Some(ReceivedCommand::EventFilters(filters)));
    }
}
