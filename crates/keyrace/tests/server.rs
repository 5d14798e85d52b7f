//! Integration tests for the Keyrace server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use keyrace::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port with the given builder tweaks and
/// returns the address.
async fn start_server_with(
    configure: impl FnOnce(KeyraceServerBuilder) -> KeyraceServerBuilder,
) -> String {
    let builder = KeyraceServer::builder()
        .bind("127.0.0.1:0")
        .snippets(SnippetDeck::new(["abc", "hello world"]).expect("deck"));
    let server = configure(builder).build().await.expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(|b| b).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, json: &str) {
    ws.send(Message::Text(json.to_string().into()))
        .await
        .expect("send");
}

/// Receives the next server message, failing after one second.
async fn recv_msg(ws: &mut ClientWs) -> ServerMessage {
    let msg = tokio::time::timeout(Duration::from_secs(1), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("recv");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

/// Asserts that no data frame arrives within a short window.
async fn assert_silent(ws: &mut ClientWs) {
    let res = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(res.is_err(), "expected no frame, got {res:?}");
}

/// Connects, joins, and returns the socket with the welcome round.
async fn join(addr: &str) -> (ClientWs, NewRound) {
    let mut ws = connect(addr).await;
    send_json(&mut ws, r#"{"JoinGameMsg":{"GameId":"dummygameid"}}"#).await;
    match recv_msg(&mut ws).await {
        ServerMessage::NewRound(round) => (ws, round),
        other => panic!("expected NewRound, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_receives_current_round() {
    let addr = start_server().await;
    let (_ws, round) = join(&addr).await;

    assert_eq!(round.snippet, "abc");
    assert_eq!(round.new_round_id, RoundId(1));
    assert_eq!(round.old_round_id, RoundId::NONE);
}

#[tokio::test]
async fn test_progress_reaches_other_client_only() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr).await;
    let (mut bob, _) = join(&addr).await;

    send_json(&mut alice, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":2}}"#).await;

    match recv_msg(&mut bob).await {
        ServerMessage::OpponentProgress(p) => {
            assert_eq!(p.correct_chars, 2);
            assert_eq!(p.round_id, RoundId(1));
        }
        other => panic!("expected OpponentProgress, got {other:?}"),
    }
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_completion_starts_next_round_for_everyone() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr).await;
    let (mut bob, _) = join(&addr).await;

    send_json(&mut alice, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":3}}"#).await;

    for ws in [&mut alice, &mut bob] {
        match recv_msg(ws).await {
            ServerMessage::NewRound(round) => {
                assert_eq!(round.snippet, "hello world");
                assert_eq!(round.old_round_id, RoundId(1));
                assert_eq!(round.new_round_id, RoundId(2));
            }
            other => panic!("expected NewRound, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_untagged_progress_is_accepted() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr).await;

    send_json(&mut alice, r#"{"CorrectCharsMsg":{"CorrectChars":3}}"#).await;

    match recv_msg(&mut alice).await {
        ServerMessage::NewRound(round) => assert_eq!(round.new_round_id, RoundId(2)),
        other => panic!("expected NewRound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_round_report_is_dropped() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr).await;
    let (mut bob, _) = join(&addr).await;

    send_json(&mut alice, r#"{"RoundId":7,"CorrectCharsMsg":{"CorrectChars":3}}"#).await;
    assert_silent(&mut bob).await;

    // The round did not move.
    let (_carol, round) = join(&addr).await;
    assert_eq!(round.new_round_id, RoundId(1));
}

#[tokio::test]
async fn test_out_of_range_progress_keeps_connection() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr).await;
    let (mut bob, _) = join(&addr).await;

    send_json(&mut alice, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":99}}"#).await;
    assert_silent(&mut bob).await;

    send_json(&mut alice, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":1}}"#).await;
    assert!(matches!(
        recv_msg(&mut bob).await,
        ServerMessage::OpponentProgress(_)
    ));
}

#[tokio::test]
async fn test_garbage_frames_are_skipped() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, "not json").await;
    send_json(&mut ws, r#"{"SomethingElse":{}}"#).await;
    ws.send(Message::Binary(vec![0xff, 0x00].into()))
        .await
        .expect("send");
    send_json(&mut ws, r#"{"JoinGameMsg":{"GameId":"x"}}"#).await;

    assert!(matches!(recv_msg(&mut ws).await, ServerMessage::NewRound(_)));
}

#[tokio::test]
async fn test_progress_before_join_is_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":3}}"#).await;
    send_json(&mut ws, r#"{"JoinGameMsg":{"GameId":"x"}}"#).await;

    match recv_msg(&mut ws).await {
        ServerMessage::NewRound(round) => assert_eq!(round.new_round_id, RoundId(1)),
        other => panic!("expected NewRound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_room_closes_connection() {
    let addr = start_server_with(|b| {
        b.room_config(RoomConfig {
            max_members: 1,
            ..RoomConfig::default()
        })
    })
    .await;
    let (_alice, _) = join(&addr).await;

    let mut bob = connect(&addr).await;
    send_json(&mut bob, r#"{"JoinGameMsg":{"GameId":"x"}}"#).await;

    let next = tokio::time::timeout(Duration::from_secs(1), bob.next())
        .await
        .expect("server should close promptly");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_frees_the_slot() {
    let addr = start_server_with(|b| {
        b.room_config(RoomConfig {
            max_members: 1,
            ..RoomConfig::default()
        })
    })
    .await;
    let (mut alice, _) = join(&addr).await;
    alice.close(None).await.expect("close");
    drop(alice);

    // The leave runs in the background; retry until the slot opens.
    for _ in 0..50 {
        let mut ws = connect(&addr).await;
        send_json(&mut ws, r#"{"JoinGameMsg":{"GameId":"x"}}"#).await;
        if let Ok(Some(Ok(Message::Text(_)))) =
            tokio::time::timeout(Duration::from_secs(1), ws.next()).await
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("slot was never freed");
}

#[tokio::test]
async fn test_unresponsive_connection_is_closed() {
    let addr = start_server_with(|b| {
        b.idle_timeout(Duration::from_millis(100))
            .keepalive_interval(Duration::from_millis(40))
    })
    .await;
    let (mut ws, _) = join(&addr).await;

    // Not reading means pings go unanswered.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => continue,
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(other)) => panic!("expected close, got {other:?}"),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "server should close an unresponsive connection");
}

#[tokio::test]
async fn test_watching_typist_is_kept_alive_by_pings() {
    let addr = start_server_with(|b| {
        b.idle_timeout(Duration::from_millis(200))
            .keepalive_interval(Duration::from_millis(50))
    })
    .await;
    let (mut ws, _) = join(&addr).await;

    // Reading answers each ping with a pong, the way a browser does.
    let mut pings = 0;
    let watch: Result<(), _> = tokio::time::timeout(Duration::from_millis(800), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => pings += 1,
                other => panic!("connection should stay open, got {other:?}"),
            }
        }
    })
    .await;
    assert!(watch.is_err(), "watch loop only ends by timing out");
    assert!(pings >= 3, "expected regular pings, got {pings}");

    // Still a member: a late joiner's progress reaches us.
    let (mut other, _) = join(&addr).await;
    send_json(&mut other, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":1}}"#).await;
    loop {
        match tokio::time::timeout(Duration::from_secs(1), ws.next())
            .await
            .expect("timed out waiting for progress")
        {
            Some(Ok(Message::Ping(_))) => continue,
            Some(Ok(msg)) => {
                let msg: ServerMessage =
                    serde_json::from_slice(&msg.into_data()).expect("decode");
                assert!(matches!(msg, ServerMessage::OpponentProgress(_)));
                break;
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_silent_tcp_peer_does_not_block_other_players() {
    let addr = start_server_with(|b| b.handshake_timeout(Duration::from_secs(30))).await;

    // Opens TCP and never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(addr.as_str()).await.expect("tcp");

    let (_ws, round) = tokio::time::timeout(Duration::from_secs(3), join(&addr))
        .await
        .expect("a silent peer must not stall other connections");
    assert_eq!(round.new_round_id, RoundId(1));
}

#[tokio::test]
async fn test_browser_utf16_count_completes_round() {
    let addr = start_server_with(|b| {
        b.snippets(SnippetDeck::new(["a🦀", "next"]).expect("deck"))
    })
    .await;
    let (mut ws, round) = join(&addr).await;
    assert_eq!(round.snippet, "a🦀");

    // "a🦀".length is 3 in the browser.
    send_json(&mut ws, r#"{"RoundId":1,"CorrectCharsMsg":{"CorrectChars":3}}"#).await;

    match recv_msg(&mut ws).await {
        ServerMessage::NewRound(round) => {
            assert_eq!(round.snippet, "next");
            assert_eq!(round.new_round_id, RoundId(2));
        }
        other => panic!("expected NewRound, got {other:?}"),
    }
}
