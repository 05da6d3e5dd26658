//! Bounds-checked binary encoder and decoder.
//!
//! Both types wrap a caller-owned byte slice and a cursor. Every operation
//! checks up front that the whole value fits; on failure it returns
//! [`ProtocolError::Capacity`] and leaves the cursor untouched, so a caller
//! can inspect the position or retry against a larger buffer.
//!
//! ## Wire format
//!
//! ```text
//! byte     b                 (signed)
//! ubyte    b                 (0..=255)
//! bool     b                 (0 or 1)
//! short    bb                (big-endian)
//! ushort   bb                (big-endian)
//! int      bbbb              (big-endian, two's complement)
//! string   b...b 0           (raw bytes, NUL-terminated, no length)
//! array    int(len) item...  (len fixed-width items)
//! color    ubyte ubyte ubyte (red, green, blue)
//! ```

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Size of an array length prefix on the wire.
const ARRAY_LEN_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Rgb
// ---------------------------------------------------------------------------

/// A display color as carried on the wire (three unsigned bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Writes typed values into a fixed-capacity buffer.
///
/// The buffer is never grown: a payload that does not fit is a
/// configuration error reported as [`ProtocolError::Capacity`].
///
/// ```rust
/// use heapscope_protocol::{Decoder, Encoder};
///
/// let mut buf = [0u8; 16];
/// let mut out = Encoder::new(&mut buf);
/// out.write_int(-666).unwrap();
/// out.write_string("gc").unwrap();
/// let len = out.len();
///
/// let mut input = Decoder::new(&buf[..len]);
/// assert_eq!(input.read_int().unwrap(), -666);
/// assert_eq!(input.read_string().unwrap(), "gc");
/// assert!(input.finished());
/// ```
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder writing from the start of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Free space left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn check(&self, extra: usize) -> Result<(), ProtocolError> {
        match self.pos.checked_add(extra) {
            Some(end) if end <= self.buf.len() => Ok(()),
            _ => Err(ProtocolError::Capacity { len: self.buf.len() }),
        }
    }

    /// Reserves `n` bytes and returns them for the caller to fill.
    fn take(&mut self, n: usize) -> Result<&mut [u8], ProtocolError> {
        self.check(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&mut self.buf[start..start + n])
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), ProtocolError> {
        self.write_ubyte(u8::from(v))
    }

    pub fn write_byte(&mut self, v: i8) -> Result<(), ProtocolError> {
        self.write_ubyte(v as u8)
    }

    pub fn write_ubyte(&mut self, v: u8) -> Result<(), ProtocolError> {
        self.take(1)?[0] = v;
        Ok(())
    }

    pub fn write_short(&mut self, v: i16) -> Result<(), ProtocolError> {
        BigEndian::write_i16(self.take(2)?, v);
        Ok(())
    }

    pub fn write_ushort(&mut self, v: u16) -> Result<(), ProtocolError> {
        BigEndian::write_u16(self.take(2)?, v);
        Ok(())
    }

    pub fn write_int(&mut self, v: i32) -> Result<(), ProtocolError> {
        BigEndian::write_i32(self.take(4)?, v);
        Ok(())
    }

    /// Writes the string's bytes followed by a single NUL terminator.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidString`] if `v` contains a NUL byte, since
    /// the reader would stop early and desynchronize.
    pub fn write_string(&mut self, v: &str) -> Result<(), ProtocolError> {
        let bytes = v.as_bytes();
        if bytes.contains(&0) {
            return Err(ProtocolError::InvalidString(format!(
                "embedded NUL in {v:?}"
            )));
        }
        let dst = self.take(bytes.len() + 1)?;
        dst[..bytes.len()].copy_from_slice(bytes);
        dst[bytes.len()] = 0;
        Ok(())
    }

    pub fn write_color(&mut self, c: Rgb) -> Result<(), ProtocolError> {
        let dst = self.take(3)?;
        dst.copy_from_slice(&[c.red, c.green, c.blue]);
        Ok(())
    }

    /// Writes an array length prefix on its own.
    ///
    /// Callers that use this must follow it with exactly `len` items.
    pub fn write_array_len(&mut self, len: usize) -> Result<(), ProtocolError> {
        let len = i32::try_from(len).map_err(|_| {
            ProtocolError::InvalidMessage(format!("array length {len} exceeds i32"))
        })?;
        self.write_int(len)
    }

    pub fn write_empty_array(&mut self) -> Result<(), ProtocolError> {
        self.write_array_len(0)
    }

    /// Writes a length prefix and `items.len()` fixed-width items, failing
    /// without writing anything if the whole array does not fit.
    fn write_array<T: Copy>(
        &mut self,
        items: &[T],
        width: usize,
        write: impl Fn(&mut [u8], T),
    ) -> Result<(), ProtocolError> {
        let body = items
            .len()
            .checked_mul(width)
            .ok_or(ProtocolError::Capacity { len: self.buf.len() })?;
        self.check(ARRAY_LEN_SIZE.saturating_add(body))?;
        self.write_array_len(items.len())?;
        let dst = self.take(body)?;
        for (chunk, item) in dst.chunks_exact_mut(width).zip(items) {
            write(chunk, *item);
        }
        Ok(())
    }

    pub fn write_byte_array(&mut self, v: &[i8]) -> Result<(), ProtocolError> {
        self.write_array(v, 1, |dst, x| dst[0] = x as u8)
    }

    pub fn write_ubyte_array(&mut self, v: &[u8]) -> Result<(), ProtocolError> {
        self.write_array(v, 1, |dst, x| dst[0] = x)
    }

    pub fn write_short_array(&mut self, v: &[i16]) -> Result<(), ProtocolError> {
        self.write_array(v, 2, BigEndian::write_i16)
    }

    pub fn write_ushort_array(&mut self, v: &[u16]) -> Result<(), ProtocolError> {
        self.write_array(v, 2, BigEndian::write_u16)
    }

    pub fn write_int_array(&mut self, v: &[i32]) -> Result<(), ProtocolError> {
        self.write_array(v, 4, BigEndian::write_i32)
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Reads typed values from one received frame.
///
/// The slice handed to [`Decoder::new`] is the frame's declared length;
/// reading past it is a [`ProtocolError::Capacity`] error.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` once every byte of the frame has been consumed.
    pub fn finished(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Verifies the frame has been fully consumed.
    ///
    /// # Errors
    /// [`FramingError::TrailingBytes`](crate::FramingError::TrailingBytes)
    /// if anything is left over.
    pub fn close(&self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(crate::FramingError::TrailingBytes(n).into()),
        }
    }

    fn check(&self, extra: usize) -> Result<(), ProtocolError> {
        if extra > self.remaining() {
            return Err(ProtocolError::Capacity { len: self.buf.len() });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.check(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    /// Reads a boolean; only the byte value `1` is `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_byte()? == 1)
    }

    pub fn read_byte(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.read_ubyte()? as i8)
    }

    pub fn read_ubyte(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_short(&mut self) -> Result<i16, ProtocolError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_ushort(&mut self) -> Result<u16, ProtocolError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_int(&mut self) -> Result<i32, ProtocolError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Reads bytes up to (and consuming) the next NUL terminator.
    ///
    /// # Errors
    /// [`ProtocolError::Capacity`] if the frame ends before a terminator
    /// (cursor unchanged), [`ProtocolError::InvalidString`] if the bytes
    /// are not UTF-8.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::Capacity { len: self.buf.len() })?;
        let text = std::str::from_utf8(&rest[..end])
            .map_err(|e| ProtocolError::InvalidString(e.to_string()))?
            .to_owned();
        self.pos += end + 1;
        Ok(text)
    }

    /// Reads three unsigned bytes as (red, green, blue).
    ///
    /// This mirrors [`Encoder::write_color`] byte for byte. Older readers
    /// named the second and third bytes "blue" and "green" but handed them
    /// to an (r, g, b) constructor in that same order, so the channels
    /// land in the same place either way.
    pub fn read_color(&mut self) -> Result<Rgb, ProtocolError> {
        let src = self.take(3)?;
        Ok(Rgb::new(src[0], src[1], src[2]))
    }

    /// Reads an array length prefix on its own.
    pub fn read_array_len(&mut self) -> Result<usize, ProtocolError> {
        self.check(ARRAY_LEN_SIZE)?;
        let len = BigEndian::read_i32(&self.buf[self.pos..]);
        let len = usize::try_from(len).map_err(|_| {
            ProtocolError::InvalidMessage(format!("negative array length {len}"))
        })?;
        self.pos += ARRAY_LEN_SIZE;
        Ok(len)
    }

    /// Reads a length prefix and that many fixed-width items. The whole
    /// array is bounds-checked before the cursor moves.
    fn read_array<T>(
        &mut self,
        width: usize,
        read: impl Fn(&[u8]) -> T,
    ) -> Result<Vec<T>, ProtocolError> {
        let start = self.pos;
        let len = self.read_array_len()?;
        let body = match len.checked_mul(width) {
            Some(body) if body <= self.remaining() => body,
            _ => {
                self.pos = start;
                return Err(ProtocolError::Capacity { len: self.buf.len() });
            }
        };
        let src = self.take(body)?;
        Ok(src.chunks_exact(width).map(read).collect())
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<i8>, ProtocolError> {
        self.read_array(1, |b| b[0] as i8)
    }

    pub fn read_ubyte_array(&mut self) -> Result<Vec<u8>, ProtocolError> {
        self.read_array(1, |b| b[0])
    }

    pub fn read_short_array(&mut self) -> Result<Vec<i16>, ProtocolError> {
        self.read_array(2, BigEndian::read_i16)
    }

    pub fn read_ushort_array(&mut self) -> Result<Vec<u16>, ProtocolError> {
        self.read_array(2, BigEndian::read_u16)
    }

    pub fn read_int_array(&mut self) -> Result<Vec<i32>, ProtocolError> {
        self.read_array(4, BigEndian::read_i32)
    }
}
