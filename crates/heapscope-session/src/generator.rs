//! Where payloads come from and where they go.
//!
//! Bootstrap and command encoding only need two things from the outside
//! world: a buffer to fill and a way to publish it, or the next buffer to
//! read. [`OutputGenerator`] and [`InputGenerator`] capture exactly that,
//! so the same code runs over a live connection ([`FrameWriter`] /
//! [`FrameReader`]) or an in-memory [`MemoryTrace`].

use heapscope_protocol::{Decoder, Encoder};
use heapscope_transport::{FrameReader, FrameWriter, DEFAULT_MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SessionError;

/// A sink of payloads.
pub trait OutputGenerator {
    /// A buffer to encode the next payload into, starting at offset 0.
    fn buffer(&mut self) -> Encoder<'_>;

    /// Publishes the first `len` bytes of the buffer as one payload.
    async fn done(&mut self, len: usize) -> Result<(), SessionError>;
}

/// A source of payloads.
pub trait InputGenerator {
    /// Waits for the next payload. Running out of payloads is an error:
    /// callers only ask when the protocol requires one.
    async fn next_input(&mut self) -> Result<Decoder<'_>, SessionError>;
}

impl<W: AsyncWrite + Unpin> OutputGenerator for FrameWriter<W> {
    fn buffer(&mut self) -> Encoder<'_> {
        self.encoder()
    }

    async fn done(&mut self, len: usize) -> Result<(), SessionError> {
        self.send(len).await?;
        Ok(())
    }
}

impl<R: AsyncRead + Unpin> InputGenerator for FrameReader<R> {
    async fn next_input(&mut self) -> Result<Decoder<'_>, SessionError> {
        self.must_receive().await?;
        Ok(self.decoder())
    }
}

// ---------------------------------------------------------------------------
// MemoryTrace
// ---------------------------------------------------------------------------

/// An in-memory recording of payloads.
///
/// Recording appends one payload per [`done`](OutputGenerator::done);
/// playback hands them back in order. The recorded payloads serialize with
/// serde, so a trace can be stored and replayed later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTrace {
    max_payload_len: usize,
    payloads: Vec<Vec<u8>>,
    #[serde(skip)]
    scratch: Vec<u8>,
    #[serde(skip)]
    cursor: usize,
}

impl MemoryTrace {
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            max_payload_len,
            payloads: Vec::new(),
            scratch: Vec::new(),
            cursor: 0,
        }
    }

    /// A trace ready to play back `payloads`.
    pub fn from_payloads(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads,
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> &[Vec<u8>] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Payloads not yet played back.
    pub fn remaining(&self) -> usize {
        self.payloads.len() - self.cursor
    }

    /// Restarts playback from the first payload.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl Default for MemoryTrace {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl OutputGenerator for MemoryTrace {
    fn buffer(&mut self) -> Encoder<'_> {
        if self.scratch.len() != self.max_payload_len {
            self.scratch = vec![0; self.max_payload_len];
        }
        Encoder::new(&mut self.scratch)
    }

    async fn done(&mut self, len: usize) -> Result<(), SessionError> {
        let payload = self.scratch.get(..len).ok_or_else(|| {
            SessionError::Protocol(heapscope_protocol::ProtocolError::Capacity {
                len: self.scratch.len(),
            })
        })?;
        self.payloads.push(payload.to_vec());
        tracing::trace!(len, recorded = self.payloads.len(), "payload recorded");
        Ok(())
    }
}

impl InputGenerator for MemoryTrace {
    async fn next_input(&mut self) -> Result<Decoder<'_>, SessionError> {
        let payload = self
            .payloads
            .get(self.cursor)
            .ok_or(SessionError::TraceExhausted(self.payloads.len()))?;
        self.cursor += 1;
        Ok(Decoder::new(payload))
    }
}
