//! Length-prefixed framing over any async byte stream.

use std::io;

use byteorder::{BigEndian, ByteOrder};
use heapscope_protocol::{Decoder, Encoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{ConnectionId, FrameConfig, TransportError};

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameWriter
// ---------------------------------------------------------------------------

/// The sending half of a framed connection.
///
/// Owns one send buffer of `max_frame_len` bytes. The usual cycle is
/// [`encoder`](Self::encoder) → write values → [`send`](Self::send) with
/// the number of bytes written. Only one task may drive a writer; the
/// protocol assumes sends on a connection are serialized.
#[derive(Debug)]
pub struct FrameWriter<W> {
    id: ConnectionId,
    inner: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(id: ConnectionId, inner: W, config: FrameConfig) -> Self {
        Self {
            id,
            inner,
            buf: vec![0; config.max_frame_len],
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn max_frame_len(&self) -> usize {
        self.buf.len()
    }

    /// Returns an encoder over the (reused) send buffer.
    pub fn encoder(&mut self) -> Encoder<'_> {
        Encoder::new(&mut self.buf)
    }

    /// Sends the first `len` bytes of the send buffer as one frame.
    ///
    /// Writes the length prefix and payload, then flushes.
    pub async fn send(&mut self, len: usize) -> Result<(), TransportError> {
        if len > self.buf.len() {
            return Err(TransportError::InvalidFrameLength {
                declared: declared_len(len),
                max: self.buf.len(),
            });
        }
        write_frame(&mut self.inner, &self.buf[..len]).await?;
        tracing::trace!(id = %self.id, len, "frame sent");
        Ok(())
    }

    /// Sends an already-encoded payload as one frame, bypassing the send
    /// buffer.
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > self.buf.len() {
            return Err(TransportError::InvalidFrameLength {
                declared: declared_len(payload.len()),
                max: self.buf.len(),
            });
        }
        write_frame(&mut self.inner, payload).await?;
        tracing::trace!(id = %self.id, len = payload.len(), "payload sent");
        Ok(())
    }

    /// Shuts down the write side of the underlying stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await.map_err(TransportError::SendFailed)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(
    inner: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = i32::try_from(payload.len()).map_err(|_| TransportError::InvalidFrameLength {
        declared: declared_len(payload.len()),
        max: FrameConfig::MAX_FRAME_LEN,
    })?;
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    BigEndian::write_i32(&mut prefix, len);
    inner
        .write_all(&prefix)
        .await
        .map_err(TransportError::SendFailed)?;
    inner
        .write_all(payload)
        .await
        .map_err(TransportError::SendFailed)?;
    inner.flush().await.map_err(TransportError::SendFailed)
}

fn declared_len(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// The receiving half of a framed connection.
///
/// Socket reads land in a reassembly buffer of `2 * max_frame_len` bytes.
/// Once it holds a whole frame the payload is copied into the receive
/// buffer, and any bytes already read past that frame are moved to the
/// front of the reassembly buffer for the next call.
#[derive(Debug)]
pub struct FrameReader<R> {
    id: ConnectionId,
    inner: R,
    max_frame_len: usize,
    frame: Vec<u8>,
    frame_len: Option<usize>,
    pending: Vec<u8>,
    pending_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(id: ConnectionId, inner: R, config: FrameConfig) -> Self {
        Self {
            id,
            inner,
            max_frame_len: config.max_frame_len,
            frame: vec![0; config.max_frame_len],
            frame_len: None,
            pending: vec![0; 2 * config.max_frame_len + LENGTH_PREFIX_SIZE],
            pending_len: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next complete frame.
    ///
    /// Returns `Ok(Some(len))` with the payload length, or `Ok(None)` if
    /// the peer closed the connection (cleanly or mid-frame). After
    /// `None`, [`has_terminated`](Self::has_terminated) is `true` and any
    /// partial frame is discarded.
    ///
    /// # Errors
    /// [`TransportError::InvalidFrameLength`] for a negative or oversized
    /// length prefix, [`TransportError::ReceiveFailed`] for I/O failures
    /// other than a reset connection.
    pub async fn receive(&mut self) -> Result<Option<usize>, TransportError> {
        self.frame_len = None;

        while self.pending_len < LENGTH_PREFIX_SIZE {
            if !self.fill().await? {
                return Ok(None);
            }
        }

        let declared = BigEndian::read_i32(&self.pending[..LENGTH_PREFIX_SIZE]);
        let len = match usize::try_from(declared) {
            Ok(len) if len <= self.max_frame_len => len,
            _ => {
                return Err(TransportError::InvalidFrameLength {
                    declared: declared.into(),
                    max: self.max_frame_len,
                });
            }
        };
        let total = LENGTH_PREFIX_SIZE + len;

        while self.pending_len < total {
            if !self.fill().await? {
                return Ok(None);
            }
        }

        self.frame[..len].copy_from_slice(&self.pending[LENGTH_PREFIX_SIZE..total]);
        self.pending.copy_within(total..self.pending_len, 0);
        self.pending_len -= total;
        self.frame_len = Some(len);

        tracing::trace!(id = %self.id, len, leftover = self.pending_len, "frame received");
        Ok(Some(len))
    }

    /// Like [`receive`](Self::receive), but a closed connection is an error.
    pub async fn must_receive(&mut self) -> Result<usize, TransportError> {
        self.receive().await?.ok_or_else(|| {
            TransportError::ConnectionClosed(
                "communication was unexpectedly terminated".into(),
            )
        })
    }

    /// `true` if the last [`receive`](Self::receive) did not yield a frame.
    pub fn has_terminated(&self) -> bool {
        self.frame_len.is_none()
    }

    /// The payload of the last received frame (empty if none).
    pub fn frame(&self) -> &[u8] {
        &self.frame[..self.frame_len.unwrap_or(0)]
    }

    /// A decoder over the last received frame.
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(self.frame())
    }

    /// Reads more bytes into the reassembly buffer. Returns `false` when
    /// the stream has ended, after resetting the reader's state.
    ///
    /// Only called while the buffer holds less than one whole frame, so
    /// the free tail is never empty.
    async fn fill(&mut self) -> Result<bool, TransportError> {
        let read = self.inner.read(&mut self.pending[self.pending_len..]).await;
        match read {
            Ok(0) => {
                self.terminate("end of stream");
                Ok(false)
            }
            Ok(n) => {
                self.pending_len += n;
                Ok(true)
            }
            Err(e) if is_disconnect(&e) => {
                self.terminate("connection reset");
                Ok(false)
            }
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    fn terminate(&mut self, reason: &str) {
        tracing::debug!(id = %self.id, discarded = self.pending_len, reason, "stream terminated");
        self.pending_len = 0;
        self.frame_len = None;
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

// ---------------------------------------------------------------------------
// FramedConnection
// ---------------------------------------------------------------------------

/// Both halves of one framed connection.
#[derive(Debug)]
pub struct FramedConnection<R, W> {
    id: ConnectionId,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R, W> FramedConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(id: ConnectionId, read: R, write: W, config: FrameConfig) -> Self {
        Self {
            id,
            reader: FrameReader::new(id, read, config),
            writer: FrameWriter::new(id, write, config),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn reader(&mut self) -> &mut FrameReader<R> {
        &mut self.reader
    }

    pub fn writer(&mut self) -> &mut FrameWriter<W> {
        &mut self.writer
    }

    /// Separates the halves so a receive loop and a sender can run in
    /// different tasks.
    pub fn into_split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;

    /// An `AsyncRead` that yields the given chunks one read at a time,
    /// then end of stream.
    struct Scripted {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Scripted {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl AsyncRead for Scripted {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.chunks.push_front(rest);
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as i32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn reader(chunks: Vec<Vec<u8>>) -> FrameReader<Scripted> {
        FrameReader::new(
            ConnectionId::new(1),
            Scripted::new(chunks),
            FrameConfig::with_max_frame_len(64),
        )
    }

    // =====================================================================
    // Reassembly
    // =====================================================================

    #[tokio::test]
    async fn test_frame_split_at_every_offset() {
        let wire = framed(b"heap!");
        for split in 1..wire.len() {
            let mut r = reader(vec![wire[..split].to_vec(), wire[split..].to_vec()]);
            assert_eq!(r.receive().await.unwrap(), Some(5), "split at {split}");
            assert_eq!(r.frame(), b"heap!");
            assert_eq!(r.receive().await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_leftover_bytes_start_next_frame() {
        // Frame one plus the first three bytes of frame two in one read.
        let mut wire = framed(b"first");
        let second = framed(b"second");
        wire.extend_from_slice(&second[..3]);
        let mut r = reader(vec![wire, second[3..].to_vec()]);

        assert_eq!(r.receive().await.unwrap(), Some(5));
        assert_eq!(r.frame(), b"first");
        assert_eq!(r.receive().await.unwrap(), Some(6));
        assert_eq!(r.frame(), b"second");
    }

    #[tokio::test]
    async fn test_two_whole_frames_in_one_read() {
        let mut wire = framed(b"a");
        wire.extend(framed(b"bc"));
        let mut r = reader(vec![wire]);
        assert_eq!(r.receive().await.unwrap(), Some(1));
        assert_eq!(r.frame(), b"a");
        assert_eq!(r.receive().await.unwrap(), Some(2));
        assert_eq!(r.frame(), b"bc");
        assert_eq!(r.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_frame_is_not_termination() {
        let mut r = reader(vec![framed(b"")]);
        assert_eq!(r.receive().await.unwrap(), Some(0));
        assert!(!r.has_terminated());
        assert!(r.frame().is_empty());
    }

    #[tokio::test]
    async fn test_zero_max_frame_len_still_reads_prefix() {
        let mut r = FrameReader::new(
            ConnectionId::new(1),
            Scripted::new(vec![framed(b""), framed(b"")]),
            FrameConfig::with_max_frame_len(0),
        );
        assert_eq!(r.receive().await.unwrap(), Some(0));
        assert!(!r.has_terminated());
        assert_eq!(r.receive().await.unwrap(), Some(0));
        assert_eq!(r.receive().await.unwrap(), None);
    }

    // =====================================================================
    // Termination
    // =====================================================================

    #[tokio::test]
    async fn test_eof_mid_frame_terminates() {
        let wire = framed(b"truncated");
        let mut r = reader(vec![wire[..6].to_vec()]);
        assert_eq!(r.receive().await.unwrap(), None);
        assert!(r.has_terminated());
        assert!(r.frame().is_empty());
    }

    #[tokio::test]
    async fn test_must_receive_promotes_termination() {
        let mut r = reader(vec![]);
        let err = r.must_receive().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let mut r = reader(vec![65i32.to_be_bytes().to_vec()]);
        let err = r.receive().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidFrameLength { declared: 65, max: 64 }
        ));
    }

    #[tokio::test]
    async fn test_negative_length_rejected() {
        let mut r = reader(vec![(-1i32).to_be_bytes().to_vec()]);
        assert!(matches!(
            r.receive().await,
            Err(TransportError::InvalidFrameLength { declared: -1, .. })
        ));
    }

    // =====================================================================
    // Writer
    // =====================================================================

    #[tokio::test]
    async fn test_writer_prefixes_length() {
        let mut w = FrameWriter::new(
            ConnectionId::new(1),
            Vec::new(),
            FrameConfig::with_max_frame_len(16),
        );
        let mut out = w.encoder();
        out.write_int(7).unwrap();
        out.write_byte(1).unwrap();
        let len = out.len();
        w.send(len).await.unwrap();

        assert_eq!(w.into_inner(), vec![0, 0, 0, 5, 0, 0, 0, 7, 1]);
    }

    #[tokio::test]
    async fn test_writer_rejects_payload_over_max() {
        let mut w = FrameWriter::new(
            ConnectionId::new(1),
            Vec::new(),
            FrameConfig::with_max_frame_len(4),
        );
        assert!(matches!(
            w.send_payload(&[0; 5]).await,
            Err(TransportError::InvalidFrameLength { declared: 5, max: 4 })
        ));
    }

    #[tokio::test]
    async fn test_writer_output_reads_back() {
        let mut w = FrameWriter::new(
            ConnectionId::new(1),
            Vec::new(),
            FrameConfig::with_max_frame_len(16),
        );
        w.send_payload(b"one").await.unwrap();
        w.send_payload(b"two").await.unwrap();

        let mut r = reader(vec![w.into_inner()]);
        assert_eq!(r.receive().await.unwrap(), Some(3));
        assert_eq!(r.decoder().read_ubyte().unwrap(), b'o');
        assert_eq!(r.receive().await.unwrap(), Some(3));
        assert_eq!(r.frame(), b"two");
    }
}
