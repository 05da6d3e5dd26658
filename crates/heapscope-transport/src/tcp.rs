//! TCP transport: a listener for the heap server, [`connect`] for the
//! visualizer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::{ConnectionId, FrameConfig, FramedConnection, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A framed TCP connection.
pub type TcpConnection = FramedConnection<OwnedReadHalf, OwnedWriteHalf>;

/// A TCP [`Transport`] that listens for incoming visualizers.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    config: FrameConfig,
}

impl TcpTransport {
    /// Binds a listener to `addr`. Port `0` picks a free port; see
    /// [`Transport::local_addr`].
    pub async fn bind(addr: &str, config: FrameConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, max_frame_len = config.max_frame_len, "TCP transport listening");
        Ok(Self { listener, config })
    }

    pub fn config(&self) -> FrameConfig {
        self.config
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = next_id();
        tracing::debug!(%id, %addr, "accepted TCP connection");
        Ok(framed(id, stream, self.config))
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// Opens a framed connection to a listening heap server.
pub async fn connect(
    addr: impl ToSocketAddrs,
    config: FrameConfig,
) -> Result<TcpConnection, TransportError> {
    config.validate()?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(TransportError::ConnectFailed)?;
    let id = next_id();
    match stream.peer_addr() {
        Ok(peer) => tracing::debug!(%id, %peer, "connected"),
        Err(e) => tracing::debug!(%id, error = %e, "connected, peer address unknown"),
    }
    Ok(framed(id, stream, config))
}

fn next_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

fn framed(id: ConnectionId, stream: TcpStream, config: FrameConfig) -> TcpConnection {
    // Frames are small and latency-sensitive.
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(%id, error = %e, "failed to set TCP_NODELAY");
    }
    let (read, write) = stream.into_split();
    FramedConnection::new(id, read, write, config)
}
