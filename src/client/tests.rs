//! Client behaviour against scripted peers.
//!
//! Each test runs a raw TCP peer that reads request lines and answers with
//! whatever the test dictates, so malformed or hostile replies can be
//! produced without a real server.

use std::{net::SocketAddr, time::Duration};

use rstest::rstest;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    task::JoinHandle,
};

use super::*;
use crate::error::ServiceErrorKind;

/// What the scripted peer does with each request line.
type Script = fn(Value) -> Option<String>;

async fn scripted_peer(script: Script) -> (SocketAddr, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut stream = BufReader::new(stream);
        let mut seen = Vec::new();
        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.expect("read") == 0 {
                break;
            }
            let request: Value = serde_json::from_str(line.trim_end()).expect("request JSON");
            seen.push(request.clone());
            match script(request) {
                Some(reply) => stream
                    .get_mut()
                    .write_all(format!("{reply}\r\n").as_bytes())
                    .await
                    .expect("write"),
                None => break,
            }
        }
        seen
    });
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> RpcClient {
    RpcClient::builder()
        .timeout(Duration::from_millis(500))
        .connect(addr)
        .await
        .expect("connect")
}

fn echo_reply(request: Value) -> Option<String> {
    let reply = match request {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| json!({"id": item["id"], "result": item["params"], "error": null}))
                .collect(),
        ),
        item => json!({"id": item["id"], "result": item["params"], "error": null}),
    };
    Some(reply.to_string())
}

#[tokio::test]
async fn call_sends_an_id_and_decodes_the_result() {
    let (addr, peer) = scripted_peer(echo_reply).await;
    let mut client = connect(addr).await;

    let reply: Vec<u8> = client.call("echo", &[1_u8, 2, 3]).await.expect("call");
    assert_eq!(reply, vec![1, 2, 3]);
    client.close().await.expect("close");

    let seen = peer.await.expect("peer");
    assert_eq!(seen[0]["method"], "echo");
    assert!(seen[0]["id"].is_string());
}

#[tokio::test]
async fn notify_omits_the_id_and_consumes_the_reply() {
    let (addr, peer) = scripted_peer(echo_reply).await;
    let mut client = connect(addr).await;

    client.notify("log", &"line").await.expect("notify");
    let value: String = client.call("echo", &"after").await.expect("call");
    assert_eq!(value, "after");
    client.close().await.expect("close");

    let seen = peer.await.expect("peer");
    assert!(seen[0].get("id").is_none());
}

#[tokio::test]
async fn remote_errors_are_classified() {
    let (addr, _peer) = scripted_peer(|request| {
        let reply = json!({"id": request["id"], "result": null, "error": "method not found: nope"});
        Some(reply.to_string())
    })
    .await;
    let mut client = connect(addr).await;

    let err = client
        .call::<_, Value>("nope", &())
        .await
        .expect_err("remote failure");
    let remote = match err {
        ClientError::Remote(remote) => remote,
        other => panic!("expected a remote error, got {other:?}"),
    };
    assert_eq!(remote.kind(), Some(ServiceErrorKind::MethodNotFound));
    assert_eq!(remote.message(), "method not found: nope");
}

#[tokio::test]
async fn mismatched_reply_id_is_rejected() {
    let (addr, _peer) = scripted_peer(|_| {
        Some(json!({"id": "someone-else", "result": 1, "error": null}).to_string())
    })
    .await;
    let mut client = connect(addr).await;
    let err = client
        .call::<_, i32>("echo", &1)
        .await
        .expect_err("mismatch");
    assert!(matches!(
        err,
        ClientError::CorrelationMismatch { received: Some(ref id), .. } if id == "someone-else"
    ));
}

#[tokio::test]
async fn result_of_the_wrong_shape_is_a_decode_error() {
    let (addr, _peer) = scripted_peer(echo_reply).await;
    let mut client = connect(addr).await;
    let err = client
        .call::<_, u32>("echo", &"not a number")
        .await
        .expect_err("decode failure");
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn peer_closing_mid_call_is_a_disconnect() {
    let (addr, _peer) = scripted_peer(|_| None).await;
    let mut client = connect(addr).await;
    let err = client
        .call::<_, Value>("echo", &1)
        .await
        .expect_err("disconnect");
    assert!(
        matches!(err, ClientError::Disconnected | ClientError::Connection(_)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let _peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });
    let mut client = RpcClient::builder()
        .timeout(Duration::from_millis(150))
        .connect(addr)
        .await
        .expect("connect");

    let started = std::time::Instant::now();
    let err = client
        .call::<_, Value>("echo", &1)
        .await
        .expect_err("timeout");
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(150)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn oversized_request_is_rejected_before_sending() {
    let (addr, _peer) = scripted_peer(echo_reply).await;
    let mut client = RpcClient::builder()
        .max_frame_length(64)
        .connect(addr)
        .await
        .expect("connect");
    let err = client
        .call::<_, Value>("echo", &"x".repeat(256))
        .await
        .expect_err("too large");
    assert!(matches!(err, ClientError::FrameTooLarge { max: 64, .. }));
}

#[tokio::test]
async fn batch_distributes_results_by_position() {
    let (addr, peer) = scripted_peer(echo_reply).await;
    let mut client = connect(addr).await;

    let first = client
        .batch_append::<_, String>("echo", &"a", false)
        .expect("append");
    let second = client
        .batch_append::<_, Value>("echo", &json!({"k": 2}), true)
        .expect("append");
    let third = client
        .batch_append::<_, i64>("echo", &3, false)
        .expect("append");
    assert_eq!(client.pending_len(), 3);
    assert!(matches!(first.take(), Err(ClientError::NotCompleted)));

    client.batch_call().await.expect("batch");
    assert_eq!(client.pending_len(), 0);
    assert_eq!(first.take().expect("first"), "a");
    assert_eq!(second.take().expect("second"), json!({"k": 2}));
    assert_eq!(third.take().expect("third"), 3);
    assert!(matches!(third.take(), Err(ClientError::NotCompleted)));
    client.close().await.expect("close");

    let seen = peer.await.expect("peer");
    let batch = seen[0].as_array().expect("batch frame");
    assert_eq!(batch.len(), 3);
    assert!(batch[1].get("id").is_none());
    assert_ne!(batch[0]["id"], batch[2]["id"]);
}

#[tokio::test]
async fn short_batch_reply_aborts_every_slot() {
    let (addr, _peer) = scripted_peer(|_| {
        Some(json!([{"id": null, "result": 1, "error": null}]).to_string())
    })
    .await;
    let mut client = connect(addr).await;
    let slots: Vec<BatchSlot<i64>> = (0..2)
        .map(|i| client.batch_append("echo", &i, false).expect("append"))
        .collect();

    let err = client.batch_call().await.expect_err("length mismatch");
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(client.pending_len(), 0);
    for slot in &slots {
        assert!(matches!(slot.take(), Err(ClientError::BatchAborted(_))));
    }
}

#[tokio::test]
async fn empty_batch_does_no_io() {
    let (addr, peer) = scripted_peer(|_| None).await;
    let mut client = connect(addr).await;
    client.batch_call().await.expect("empty batch is a no-op");
    client.close().await.expect("close");
    assert!(peer.await.expect("peer").is_empty(), "no frame was sent");
}

#[rstest]
#[case::empty("", false)]
#[case::newline("\n", true)]
#[case::multi_byte("<EOM>", true)]
fn builder_validates_terminators(#[case] terminator: &str, #[case] accepted: bool) {
    assert_eq!(RpcClient::builder().terminator(terminator).is_ok(), accepted);
}
