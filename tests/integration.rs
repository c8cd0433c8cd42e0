//! Integration tests for nailpin.
//!
//! Drive a full session over an in-memory duplex transport with a scripted
//! server on the other end.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, oneshot};

use nailpin::protocol::{encode_chunk, Chunk, ChunkBuffer, ChunkType};
use nailpin::{NailConfig, NailpinError, Session, SessionEvents, SessionState};

/// Recorded session events, in callback order.
#[derive(Debug, PartialEq, Eq)]
enum Ev {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(i32),
    Error(String),
}

fn recorder() -> (SessionEvents, mpsc::UnboundedReceiver<Ev>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let out = tx.clone();
    let err = tx.clone();
    let exit = tx.clone();
    let events = SessionEvents::new()
        .on_stdout(move |b| out.send(Ev::Stdout(b.to_vec())).unwrap())
        .on_stderr(move |b| err.send(Ev::Stderr(b.to_vec())).unwrap())
        .on_exit(move |c| exit.send(Ev::Exit(c)).unwrap())
        .on_error(move |e| tx.send(Ev::Error(e.to_string())).unwrap());
    (events, rx)
}

/// Read from the server end until `count` chunks have been decoded.
async fn read_chunks(stream: &mut DuplexStream, count: usize) -> Vec<Chunk> {
    let mut buffer = ChunkBuffer::new();
    let mut chunks = Vec::new();
    let mut buf = [0u8; 4096];
    while chunks.len() < count {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before {count} chunks arrived");
        chunks.extend(buffer.push(&buf[..n]).unwrap());
    }
    assert_eq!(chunks.len(), count, "more chunks than expected");
    chunks
}

async fn wait_for(session: &Session, pred: impl Fn(SessionState) -> bool) {
    for _ in 0..1000 {
        if pred(session.state()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for session state, last = {:?}", session.state());
}

fn open_over(
    config: NailConfig,
    events: SessionEvents,
    stream: DuplexStream,
) -> Session {
    Session::open_with(config, events, async move {
        Ok::<_, std::io::Error>(stream)
    })
    .unwrap()
}

#[tokio::test]
async fn full_invocation_round_trip() {
    let (client_end, mut server) = tokio::io::duplex(64 * 1024);
    let (events, mut rx) = recorder();

    let config = NailConfig::new("io.foldr.ngtesthost.Stdout")
        .with_args(["--greet", "world"])
        .with_env([("LANG", "C")])
        .with_cwd("/tmp");
    let session = open_over(config, events, client_end);

    // Server sees the fixed handshake sequence first.
    let handshake = read_chunks(&mut server, 5).await;
    let types: Vec<_> = handshake.iter().map(|c| c.chunk_type).collect();
    assert_eq!(
        types,
        vec![
            ChunkType::Argument,
            ChunkType::Argument,
            ChunkType::Environment,
            ChunkType::WorkingDirectory,
            ChunkType::Command,
        ]
    );
    assert_eq!(handshake[0].payload(), b"--greet");
    assert_eq!(handshake[1].payload(), b"world");
    assert_eq!(handshake[2].payload(), b"LANG=C");
    assert_eq!(handshake[3].payload(), b"/tmp");
    assert_eq!(handshake[4].payload(), b"io.foldr.ngtesthost.Stdout");

    // Client sends stdin then closes it.
    session.write_stdin_acked(b"ping").await.unwrap();
    session.close_stdin().await.unwrap();

    let stdin = read_chunks(&mut server, 2).await;
    assert_eq!(stdin[0].chunk_type, ChunkType::Stdin);
    assert_eq!(stdin[0].payload(), b"ping");
    assert_eq!(stdin[1].chunk_type, ChunkType::Eof);
    assert!(stdin[1].payload().is_empty());

    // Server streams output and exits.
    server
        .write_all(&encode_chunk(ChunkType::Stdout, b"hello\n"))
        .await
        .unwrap();
    server
        .write_all(&encode_chunk(ChunkType::Stderr, b"warn\n"))
        .await
        .unwrap();
    server
        .write_all(&encode_chunk(ChunkType::Exit, b"0"))
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap(), Ev::Stdout(b"hello\n".to_vec()));
    assert_eq!(rx.recv().await.unwrap(), Ev::Stderr(b"warn\n".to_vec()));
    assert_eq!(rx.recv().await.unwrap(), Ev::Exit(0));

    // Exit chunk moves the session to Closed; no further writes accepted.
    wait_for(&session, SessionState::is_terminal).await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.write_stdin(b"too late").await,
        Err(NailpinError::ConnectionClosed)
    ));

    assert_eq!(session.closed().await, SessionState::Closed);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn handshake_bytes_are_exact() {
    let (client_end, mut server) = tokio::io::duplex(4096);

    let config = NailConfig::new("M")
        .with_args(["x"])
        .with_env([("K", "V")])
        .with_cwd("/w");
    let _session = open_over(config, SessionEvents::new(), client_end);

    let mut expected = Vec::new();
    expected.extend_from_slice(&[0, 0, 0, 1, b'A', b'x']);
    expected.extend_from_slice(&[0, 0, 0, 3, b'E', b'K', b'=', b'V']);
    expected.extend_from_slice(&[0, 0, 0, 2, b'D', b'/', b'w']);
    expected.extend_from_slice(&[0, 0, 0, 1, b'C', b'M']);

    let mut actual = vec![0u8; expected.len()];
    server.read_exact(&mut actual).await.unwrap();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn writes_before_connect_flush_in_order() {
    let (gate_tx, gate_rx) = oneshot::channel::<DuplexStream>();
    let (client_end, mut server) = tokio::io::duplex(64 * 1024);

    let session = Session::open_with(
        NailConfig::new("pkg.Main"),
        SessionEvents::new(),
        async move { Ok::<_, std::io::Error>(gate_rx.await.unwrap()) },
    )
    .unwrap();

    // Issue writes while the connect future is still pending.
    session.write_stdin(b"one").await.unwrap();
    session.write_stdin(b"two").await.unwrap();

    // Wait until both frames sit in the outbound queue (5-byte header + 3
    // payload bytes each).
    for _ in 0..1000 {
        if session.queued_bytes() == 16 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(session.queued_bytes(), 16);
    assert_eq!(session.state(), SessionState::Connecting);

    // Release the connect and issue one more write once Ready.
    gate_tx.send(client_end).unwrap();
    wait_for(&session, |s| s == SessionState::Ready).await;
    session.write_stdin_acked(b"after").await.unwrap();
    assert_eq!(session.queued_bytes(), 0);

    // Wire order: queued frames flush first in enqueue order, then the
    // handshake, then the post-Ready write.
    let chunks = read_chunks(&mut server, 5).await;
    let seen: Vec<_> = chunks
        .iter()
        .map(|c| (c.chunk_type, c.payload().to_vec()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (ChunkType::Stdin, b"one".to_vec()),
            (ChunkType::Stdin, b"two".to_vec()),
            (ChunkType::WorkingDirectory, b".".to_vec()),
            (ChunkType::Command, b"pkg.Main".to_vec()),
            (ChunkType::Stdin, b"after".to_vec()),
        ]
    );
}

#[tokio::test]
async fn inbound_frames_split_across_reads() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let (events, mut rx) = recorder();
    let session = open_over(NailConfig::new("pkg.Main"), events, client_end);

    // Consume the handshake.
    read_chunks(&mut server, 2).await;

    // Deliver one stdout frame split mid-header, plus a second frame
    // coalesced with the tail of the first.
    let mut bytes = encode_chunk(ChunkType::Stdout, b"abc");
    bytes.extend_from_slice(&encode_chunk(ChunkType::Exit, b"7"));

    server.write_all(&bytes[..4]).await.unwrap();
    server.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    server.write_all(&bytes[4..]).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), Ev::Stdout(b"abc".to_vec()));
    assert_eq!(rx.recv().await.unwrap(), Ev::Exit(7));
    assert_eq!(session.closed().await, SessionState::Closed);
}

#[tokio::test]
async fn unrecognized_chunk_type_fails_session() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let (events, mut rx) = recorder();
    let session = open_over(NailConfig::new("pkg.Main"), events, client_end);

    read_chunks(&mut server, 2).await;

    // 'Q' is not one of the nine known codes.
    server.write_all(&[0, 0, 0, 0, b'Q']).await.unwrap();

    match rx.recv().await.unwrap() {
        Ev::Error(msg) => assert!(msg.contains("0x51"), "unexpected message: {msg}"),
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(session.closed().await, SessionState::Failed);
}

#[tokio::test]
async fn premature_close_is_distinct_from_eof() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let (events, mut rx) = recorder();
    let session = open_over(NailConfig::new("pkg.Main"), events, client_end);

    read_chunks(&mut server, 2).await;

    // Partial frame: header claims 10 payload bytes, only one arrives.
    server.write_all(&[0, 0, 0, 10, b'1', b'h']).await.unwrap();
    server.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(server);

    match rx.recv().await.unwrap() {
        Ev::Error(msg) => assert!(msg.contains("mid-frame"), "unexpected message: {msg}"),
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(session.closed().await, SessionState::Failed);
}

#[tokio::test]
async fn clean_server_eof_closes_session() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let (events, mut rx) = recorder();
    let session = open_over(NailConfig::new("pkg.Main"), events, client_end);

    read_chunks(&mut server, 2).await;
    drop(server);

    assert_eq!(session.closed().await, SessionState::Closed);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn server_sent_client_chunk_fails_session() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let (events, mut rx) = recorder();
    let session = open_over(NailConfig::new("pkg.Main"), events, client_end);

    read_chunks(&mut server, 2).await;

    // Command chunks flow client-to-server only.
    server
        .write_all(&encode_chunk(ChunkType::Command, b"bogus"))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        Ev::Error(msg) => assert!(msg.contains("client-only"), "unexpected message: {msg}"),
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(session.closed().await, SessionState::Failed);
}

#[tokio::test]
async fn local_close_stops_the_session() {
    let (client_end, mut server) = tokio::io::duplex(4096);
    let session = open_over(NailConfig::new("pkg.Main"), SessionEvents::new(), client_end);

    read_chunks(&mut server, 2).await;

    session.close().await;
    assert_eq!(session.closed().await, SessionState::Closed);
}
