//! The first frame exchange of every connection.
//!
//! ```text
//! visualizer → server   string "GCspy666", int 1, bool pause_at_start
//! server → visualizer   string "GCspy666", int 1, string server_name
//! ```
//!
//! The visualizer speaks first. Either side aborts on a wrong magic string
//! or endianness marker before any entity data is exchanged.

use heapscope_protocol::{Decoder, Encoder};
use heapscope_transport::{FrameReader, FrameWriter};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{InputGenerator, OutputGenerator, SessionError};

/// Identifies the protocol.
pub const MAGIC_STRING: &str = "GCspy666";

/// Byte-order marker; always `1`.
pub const ENDIANNESS: i32 = 1;

/// What the visualizer announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientHello {
    /// Ask the server to pause at its first safepoint.
    pub pause_at_start: bool,
}

/// What the server announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    pub name: String,
}

fn write_preamble(out: &mut Encoder<'_>) -> Result<(), SessionError> {
    out.write_string(MAGIC_STRING)?;
    out.write_int(ENDIANNESS)?;
    Ok(())
}

fn check_preamble(input: &mut Decoder<'_>) -> Result<(), SessionError> {
    let magic = input.read_string()?;
    if magic != MAGIC_STRING {
        return Err(SessionError::Handshake(format!(
            "magic string does not match: {magic:?}"
        )));
    }
    let endianness = input.read_int()?;
    if endianness != ENDIANNESS {
        return Err(SessionError::Handshake(format!(
            "endianness field does not match: {endianness}"
        )));
    }
    Ok(())
}

impl ClientHello {
    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), SessionError> {
        write_preamble(out)?;
        out.write_bool(self.pause_at_start)?;
        Ok(())
    }

    pub fn decode(input: &mut Decoder<'_>) -> Result<Self, SessionError> {
        check_preamble(input)?;
        let pause_at_start = input.read_bool()?;
        input.close()?;
        Ok(Self { pause_at_start })
    }
}

impl ServerHello {
    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), SessionError> {
        write_preamble(out)?;
        out.write_string(&self.name)?;
        Ok(())
    }

    pub fn decode(input: &mut Decoder<'_>) -> Result<Self, SessionError> {
        check_preamble(input)?;
        let name = input.read_string()?;
        input.close()?;
        Ok(Self { name })
    }
}

/// Runs the visualizer's half: send our hello, then read the server's.
pub async fn client_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    hello: ClientHello,
) -> Result<ServerHello, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut out = writer.buffer();
    hello.encode(&mut out)?;
    let len = out.len();
    writer.done(len).await?;

    let mut input = reader.next_input().await?;
    let server = ServerHello::decode(&mut input)?;
    tracing::info!(id = %reader.id(), server = %server.name, "handshake complete");
    Ok(server)
}

/// Runs the server's half: read the visualizer's hello, then send ours.
pub async fn server_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    name: &str,
) -> Result<ClientHello, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut input = reader.next_input().await?;
    let client = ClientHello::decode(&mut input)?;

    let mut out = writer.buffer();
    ServerHello { name: name.to_owned() }.encode(&mut out)?;
    let len = out.len();
    writer.done(len).await?;

    tracing::info!(
        id = %writer.id(),
        pause_at_start = client.pause_at_start,
        "handshake complete"
    );
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(f: impl FnOnce(&mut Encoder<'_>)) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut out = Encoder::new(&mut buf);
        f(&mut out);
        let len = out.len();
        buf.truncate(len);
        buf
    }

    #[test]
    fn test_client_hello_layout() {
        let bytes = encode(|out| {
            ClientHello {
                pause_at_start: true,
            }
            .encode(out)
            .unwrap()
        });
        assert_eq!(bytes, b"GCspy666\0\0\0\0\x01\x01".to_vec());
        let hello = ClientHello::decode(&mut Decoder::new(&bytes)).unwrap();
        assert!(hello.pause_at_start);
    }

    #[test]
    fn test_server_hello_round_trip() {
        let bytes = encode(|out| {
            ServerHello {
                name: "JVM".into(),
            }
            .encode(out)
            .unwrap()
        });
        let hello = ServerHello::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(hello.name, "JVM");
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let bytes = encode(|out| {
            out.write_string("GCspy665").unwrap();
            out.write_int(ENDIANNESS).unwrap();
            out.write_bool(false).unwrap();
        });
        assert!(matches!(
            ClientHello::decode(&mut Decoder::new(&bytes)),
            Err(SessionError::Handshake(_))
        ));
    }

    #[test]
    fn test_wrong_endianness_rejected() {
        let bytes = encode(|out| {
            out.write_string(MAGIC_STRING).unwrap();
            out.write_int(0x0100_0000).unwrap();
            out.write_string("x").unwrap();
        });
        let err = ServerHello::decode(&mut Decoder::new(&bytes)).unwrap_err();
        assert!(err.to_string().contains("endianness"));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = encode(|out| {
            ClientHello::default().encode(out).unwrap();
            out.write_byte(0).unwrap();
        });
        assert!(matches!(
            ClientHello::decode(&mut Decoder::new(&bytes)),
            Err(SessionError::Protocol(_))
        ));
    }
}
