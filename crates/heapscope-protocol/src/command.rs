//! Opcode-addressed command streams.
//!
//! A command stream is the payload of one frame:
//!
//! ```text
//! int MAGIC_START (666666)
//! ( ubyte opcode, opcode-specific payload )*
//! ubyte 0                   ← end of stream
//! int MAGIC_END (-666)
//! ```
//!
//! Senders build the envelope with [`start_stream`], [`put_command`] and
//! [`finish_stream`], writing each command's arguments themselves in
//! between. Receivers call [`CommandStream::execute`], which validates the
//! envelope and hands each decoded command to a handler together with the
//! shared [`Decoder`], so the handler consumes exactly its own payload.

use std::fmt;

use crate::{Decoder, Encoder, FramingError, ProtocolError};

/// Sentinel written before the first opcode.
pub const MAGIC_START: i32 = 666_666;

/// Sentinel written after the end-of-stream opcode.
pub const MAGIC_END: i32 = -666;

/// Reserved opcode terminating the command sequence.
pub const END_OF_STREAM: u8 = 0;

/// The lowest opcode a command set may use.
pub const FIRST_COMMAND: u8 = END_OF_STREAM + 1;

/// A closed set of commands addressable by a single-byte opcode.
///
/// Implemented by the session layer's opcode enum. Opcodes must be in
/// `FIRST_COMMAND..=127` because they travel as a signed byte.
pub trait CommandSet: Copy + fmt::Debug {
    /// The opcode written on the wire for this command.
    fn opcode(self) -> u8;
}

/// Writes `MAGIC_START`, opening a command stream.
pub fn start_stream(out: &mut Encoder<'_>) -> Result<(), ProtocolError> {
    out.write_int(MAGIC_START)
}

/// Writes one command's opcode. The caller writes its payload next.
pub fn put_command<C: CommandSet>(
    out: &mut Encoder<'_>,
    command: C,
) -> Result<(), ProtocolError> {
    out.write_ubyte(command.opcode())
}

/// Writes the end-of-stream opcode and `MAGIC_END`.
pub fn finish_stream(out: &mut Encoder<'_>) -> Result<(), ProtocolError> {
    out.write_ubyte(END_OF_STREAM)?;
    out.write_int(MAGIC_END)
}

/// A dispatch table mapping opcodes `1..=max` to commands.
///
/// The table is validated once, when it is built: entry `i` must carry
/// opcode `i + 1`, with no gaps or duplicates. Dispatch then only has to
/// bounds-check the opcode byte.
#[derive(Debug, Clone)]
pub struct CommandStream<C> {
    commands: Vec<C>,
}

impl<C: CommandSet> CommandStream<C> {
    /// Builds a table from commands listed in opcode order.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidCommandTable`] if the list is empty, longer
    /// than 127 entries, or not exactly `1, 2, 3, ...` in opcode order.
    pub fn new(commands: impl IntoIterator<Item = C>) -> Result<Self, ProtocolError> {
        let commands: Vec<C> = commands.into_iter().collect();
        if commands.is_empty() {
            return Err(ProtocolError::InvalidCommandTable(
                "no commands registered".into(),
            ));
        }
        if commands.len() > i8::MAX as usize {
            return Err(ProtocolError::InvalidCommandTable(format!(
                "{} commands exceed the signed opcode range",
                commands.len()
            )));
        }
        for (index, command) in commands.iter().enumerate() {
            let expected = FIRST_COMMAND as usize + index;
            if command.opcode() as usize != expected {
                return Err(ProtocolError::InvalidCommandTable(format!(
                    "{command:?} has opcode {}, expected {expected}",
                    command.opcode()
                )));
            }
        }
        Ok(Self { commands })
    }

    /// The highest registered opcode.
    pub fn max_opcode(&self) -> u8 {
        self.commands.len() as u8
    }

    /// Resolves an opcode byte to its command.
    ///
    /// `0` is not a command; callers test for [`END_OF_STREAM`] first.
    ///
    /// # Errors
    /// [`FramingError::OpcodeOutOfRange`] for negative values, `0`, and
    /// anything above [`max_opcode`](Self::max_opcode).
    pub fn lookup(&self, opcode: i8) -> Result<C, FramingError> {
        if opcode < FIRST_COMMAND as i8 || opcode as u8 > self.max_opcode() {
            return Err(FramingError::OpcodeOutOfRange(opcode));
        }
        Ok(self.commands[(opcode as u8 - FIRST_COMMAND) as usize])
    }

    /// Validates the envelope of `input` and dispatches every command in it.
    ///
    /// Returns the number of commands dispatched. The handler must consume
    /// exactly its command's payload from the decoder it is given.
    ///
    /// # Errors
    /// A [`FramingError`] for a wrong start or end sentinel, an opcode
    /// outside the table, or bytes left over after `MAGIC_END`; any error
    /// the handler returns, unchanged.
    pub fn execute<E, F>(&self, input: &mut Decoder<'_>, mut handler: F) -> Result<usize, E>
    where
        E: From<ProtocolError>,
        F: FnMut(C, &mut Decoder<'_>) -> Result<(), E>,
    {
        let magic = input.read_int()?;
        if magic != MAGIC_START {
            return Err(ProtocolError::from(FramingError::BadStartMagic(magic)).into());
        }

        let mut dispatched = 0;
        loop {
            let opcode = input.read_byte()?;
            if opcode == END_OF_STREAM as i8 {
                break;
            }
            let command = self.lookup(opcode).map_err(ProtocolError::from)?;
            tracing::trace!(?command, at = input.position(), "dispatching command");
            handler(command, input)?;
            dispatched += 1;
        }

        let magic = input.read_int()?;
        if magic != MAGIC_END {
            return Err(ProtocolError::from(FramingError::BadEndMagic(magic)).into());
        }
        input.close()?;
        Ok(dispatched)
    }
}
