//! Handshake, bootstrap and commands over a real loopback connection.

use heapscope_model::{DataType, Events, Presentation, Space, StreamData, StreamSpec};
use heapscope_protocol::Rgb;
use heapscope_session::{
    client_handshake, dispatch_to_client, server_handshake, ClientHello, Command, Heap, InputGenerator,
    ReceivedCommand, SessionError,
};
use heapscope_transport::{connect, FrameConfig, TcpTransport, Transport};
use tokio::io::AsyncWriteExt;

fn heap() -> Heap {
    let mut heap = Heap::new("Semispace copying collector", Events::new(["Young GC", "Old GC"]));
    let mut space = Space::new("Nursery", "copying", 3, "Block ", "32K", None, true);
    space
        .add_stream(
            StreamSpec::new("Used", DataType::Int)
                .range(0, 32 * 1024)
                .presentation(Presentation::Percent)
                .color(Rgb::new(255, 0, 0)),
        )
        .unwrap();
    heap.add_space(space).unwrap();
    heap
}

async fn pair() -> (
    heapscope_transport::TcpConnection,
    heapscope_transport::TcpConnection,
) {
    let mut transport = TcpTransport::bind("127.0.0.1:0", FrameConfig::default())
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have address");
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let client = connect(addr, FrameConfig::default())
        .await
        .expect("should connect");
    (server.await.expect("task should complete"), client)
}

#[tokio::test]
async fn test_handshake_then_bootstrap_then_event() {
    let (server, client) = pair().await;

    let server_task = tokio::spawn(async move {
        let (mut reader, mut writer) = server.into_split();
        let hello = server_handshake(&mut reader, &mut writer, "Test JVM")
            .await
            .expect("server handshake");
        assert!(hello.pause_at_start);

        heap().send_bootstrap(&mut writer).await.expect("bootstrap");
        Command::Event {
            event: 1,
            elapsed: 120,
            compensation: 30,
        }
        .send(&mut writer)
        .await
        .expect("event");
    });

    let (mut reader, mut writer) = client.into_split();
    let server_hello = client_handshake(
        &mut reader,
        &mut writer,
        ClientHello {
            pause_at_start: true,
        },
    )
    .await
    .expect("client handshake");
    assert_eq!(server_hello.name, "Test JVM");

    let mut heap = Heap::receive_bootstrap(&mut reader)
        .await
        .expect("bootstrap");
    assert_eq!(heap.events.name(1), Some("Old GC"));
    assert_eq!(heap.space(0).unwrap().stream(0).unwrap().color(), Rgb::new(255, 0, 0));

    let mut commands = Vec::new();
    let input = &mut reader.next_input().await.expect("event frame");
    dispatch_to_client(input, &mut heap, |cmd, _| {
        commands.push(cmd);
        Ok(())
    })
    .expect("dispatch");
    assert_eq!(
        commands,
        vec![ReceivedCommand::Event {
            event: 1,
            elapsed: 120,
            compensation: 30,
        }]
    );
    server_task.await.expect("server task");
}

#[tokio::test]
async fn test_stream_data_applies_to_bootstrapped_space() {
    let (server, client) = pair().await;

    let server_task = tokio::spawn(async move {
        let (mut reader, mut writer) = server.into_split();
        server_handshake(&mut reader, &mut writer, "srv")
            .await
            .expect("server handshake");
        heap().send_bootstrap(&mut writer).await.expect("bootstrap");
        let data = StreamData::Int(vec![100, 200, 300]);
        Command::Stream {
            space: 0,
            stream: 0,
            data: &data,
            count: data.len(),
        }
        .send(&mut writer)
        .await
        .expect("stream");
    });

    let (mut reader, mut writer) = client.into_split();
    client_handshake(&mut reader, &mut writer, ClientHello::default())
        .await
        .expect("client handshake");
    let mut heap = Heap::receive_bootstrap(&mut reader).await.expect("bootstrap");

    let input = &mut reader.next_input().await.expect("stream frame");
    dispatch_to_client(input, &mut heap, |cmd, heap| {
        if let ReceivedCommand::Stream {
            space,
            stream,
            data,
        } = cmd
        {
            heap.space_mut(space)?
                .stream_mut(usize::from(stream))
                .ok_or(SessionError::UnknownStream { space, stream })?
                .apply_data(data)?;
        }
        Ok(())
    })
    .expect("dispatch");

    let stream = heap.space(0).unwrap().stream(0).unwrap();
    assert_eq!(stream.data(), &StreamData::Int(vec![100, 200, 300]));
    server_task.await.expect("server task");
}

#[tokio::test]
async fn test_wrong_magic_aborts_handshake() {
    let (server, client) = pair().await;

    let server_task = tokio::spawn(async move {
        let (mut reader, mut writer) = server.into_split();
        server_handshake(&mut reader, &mut writer, "srv").await
    });

    let (_reader, mut writer) = client.into_split();
    let mut out = writer.encoder();
    out.write_string("NotGCspy").unwrap();
    out.write_int(1).unwrap();
    out.write_bool(false).unwrap();
    let len = out.len();
    writer.send(len).await.expect("send");

    let result = server_task.await.expect("server task");
    assert!(matches!(result, Err(SessionError::Handshake(_))));
    writer.into_inner().shutdown().await.ok();
}

#[tokio::test]
async fn test_peer_closing_during_bootstrap_is_error() {
    let (server, client) = pair().await;

    let server_task = tokio::spawn(async move {
        let (mut reader, mut writer) = server.into_split();
        server_handshake(&mut reader, &mut writer, "srv")
            .await
            .expect("server handshake");
        // Header only, then hang up.
        let mut out = writer.encoder();
        out.write_short(1).unwrap();
        out.write_string("").unwrap();
        out.write_short(0).unwrap();
        let len = out.len();
        writer.send(len).await.expect("header");
    });

    let (mut reader, mut writer) = client.into_split();
    client_handshake(&mut reader, &mut writer, ClientHello::default())
        .await
        .expect("client handshake");
    server_task.await.expect("server task");

    let result = Heap::receive_bootstrap(&mut reader).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
}
