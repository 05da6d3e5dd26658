/// Errors that can occur in the transport layer.
///
/// A peer closing the socket between or inside frames is not an error at
/// this level: [`FrameReader::receive`](crate::FrameReader::receive)
/// reports it as `Ok(None)`. Only
/// [`must_receive`](crate::FrameReader::must_receive) turns it into
/// [`TransportError::ConnectionClosed`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection ended where a frame was required.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A length prefix was negative or above the configured maximum.
    #[error("invalid frame length {declared} (max {max})")]
    InvalidFrameLength { declared: i64, max: usize },

    /// A frame configuration whose maximum cannot be carried by the
    /// length prefix.
    #[error("max frame length {0} must be between 1 and {max}", max = crate::FrameConfig::MAX_FRAME_LEN)]
    InvalidMaxFrameLength(usize),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a remote endpoint failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Encoding or decoding a frame's contents failed.
    #[error(transparent)]
    Protocol(#[from] heapscope_protocol::ProtocolError),
}
