//! Integration tests for the TCP transport.
//!
//! These bind a real listener on `127.0.0.1:0` (the OS picks a free
//! port) and push frames both ways over loopback.

use heapscope_transport::{connect, FrameConfig, Transport, TcpTransport, TransportError};
use tokio::io::AsyncWriteExt;

async fn listener(max: usize) -> (TcpTransport, std::net::SocketAddr) {
    let transport = TcpTransport::bind("127.0.0.1:0", FrameConfig::with_max_frame_len(max))
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have address");
    (transport, addr)
}

#[tokio::test]
async fn test_frames_flow_both_ways() {
    let (mut transport, addr) = listener(1024).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut client = connect(addr, FrameConfig::with_max_frame_len(1024))
        .await
        .expect("should connect");
    let mut server_conn = server.await.expect("task should complete");
    assert_ne!(client.id(), server_conn.id());

    // --- Client sends, server receives ---
    let mut out = client.writer().encoder();
    out.write_int(666_666).unwrap();
    out.write_string("GCspy").unwrap();
    let len = out.len();
    client.writer().send(len).await.expect("send should succeed");

    let got = server_conn.reader().must_receive().await.expect("should receive");
    assert_eq!(got, len);
    let mut input = server_conn.reader().decoder();
    assert_eq!(input.read_int().unwrap(), 666_666);
    assert_eq!(input.read_string().unwrap(), "GCspy");
    assert!(input.finished());

    // --- Server sends, client receives ---
    server_conn
        .writer()
        .send_payload(b"reply")
        .await
        .expect("send should succeed");
    assert_eq!(client.reader().receive().await.unwrap(), Some(5));
    assert_eq!(client.reader().frame(), b"reply");
}

#[tokio::test]
async fn test_many_frames_arrive_in_order() {
    let (mut transport, addr) = listener(64).await;
    let server = tokio::spawn(async move {
        let conn = transport.accept().await.expect("should accept");
        let (_, mut writer) = conn.into_split();
        for i in 0..200i32 {
            let mut out = writer.encoder();
            out.write_int(i).unwrap();
            let len = out.len();
            writer.send(len).await.expect("send should succeed");
        }
        writer.shutdown().await.expect("shutdown should succeed");
    });

    let client = connect(addr, FrameConfig::with_max_frame_len(64))
        .await
        .expect("should connect");
    let (mut reader, _writer) = client.into_split();

    let mut expected = 0;
    while let Some(_) = reader.receive().await.expect("receive should succeed") {
        assert_eq!(reader.decoder().read_int().unwrap(), expected);
        expected += 1;
    }
    assert_eq!(expected, 200);
    assert!(reader.has_terminated());
    server.await.unwrap();
}

#[tokio::test]
async fn test_peer_close_reports_termination() {
    let (mut transport, addr) = listener(64).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let client = connect(addr, FrameConfig::with_max_frame_len(64))
        .await
        .expect("should connect");
    let mut server_conn = server.await.unwrap();
    drop(client);

    assert_eq!(server_conn.reader().receive().await.unwrap(), None);
    assert!(matches!(
        server_conn.reader().must_receive().await,
        Err(TransportError::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn test_oversized_prefix_from_raw_peer_rejected() {
    let (mut transport, addr) = listener(16).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    raw.write_all(&1000i32.to_be_bytes()).await.unwrap();

    let mut server_conn = server.await.unwrap();
    let err = server_conn.reader().receive().await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidFrameLength {
            declared: 1000,
            max: 16
        }
    ));
}

#[tokio::test]
async fn test_unusable_frame_config_refused() {
    assert!(matches!(
        TcpTransport::bind("127.0.0.1:0", FrameConfig::with_max_frame_len(0)).await,
        Err(TransportError::InvalidMaxFrameLength(0))
    ));
    let (_transport, addr) = listener(16).await;
    let too_long = FrameConfig::with_max_frame_len(FrameConfig::MAX_FRAME_LEN + 1);
    assert!(matches!(
        connect(addr, too_long).await,
        Err(TransportError::InvalidMaxFrameLength(_))
    ));
}
