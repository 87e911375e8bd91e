//! End-to-end sessions over a real WebSocket against a local server.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use healthflow_spark::auth::sign;
use healthflow_spark::{
    ChatRequest, Credentials, SendOptions, SessionState, SparkClient, SparkConfig, SparkError,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

const API_KEY: &str = "integration-key";
const SECRET: &str = "integration-secret";

/// What the server observed during one connection.
#[derive(Debug)]
struct Observed {
    uri: String,
    envelope: Value,
    client_closed: bool,
}

enum Script {
    /// Send frames, then wait for the client to close.
    Reply(Vec<Value>),
    /// Send frames, then close from the server side.
    ReplyThenClose(Vec<Value>),
    /// Send raw binary frames, then wait for the client to close.
    ReplyBinary(Vec<Vec<u8>>),
    /// Never answer.
    Silent,
}

async fn spawn_server(script: Script) -> (u16, oneshot::Receiver<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (uri_tx, uri_rx) = std::sync::mpsc::channel();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri_tx.send(req.uri().to_string()).unwrap();
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let uri = uri_rx.recv().unwrap();

        let envelope = match ws.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected envelope, got {other:?}"),
        };

        match script {
            Script::Reply(frames) => {
                for frame in frames {
                    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
                }
            }
            Script::ReplyThenClose(frames) => {
                for frame in frames {
                    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
                }
                let _ = ws.close(None).await;
            }
            Script::ReplyBinary(frames) => {
                for frame in frames {
                    ws.send(Message::Binary(frame.into())).await.unwrap();
                }
            }
            Script::Silent => {}
        }

        let mut client_closed = false;
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Close(_)) => {
                    client_closed = true;
                    break;
                }
                Err(_) => break,
                Ok(_) => {}
            }
        }

        let _ = tx.send(Observed {
            uri,
            envelope,
            client_closed,
        });
    });

    (port, rx)
}

fn client_for(port: u16, timeout_secs: u64) -> SparkClient {
    let credentials = Credentials::new(
        "integration-app",
        API_KEY,
        SECRET,
        &format!("ws://127.0.0.1:{port}/v1.1/chat"),
    )
    .unwrap();
    let mut config = SparkConfig::new(credentials);
    config.session.timeout_secs = timeout_secs;
    SparkClient::new(config).unwrap()
}

fn content(status: i64, text: &str) -> Value {
    json!({
        "header": { "code": 0, "message": "Success", "sid": "cht000b0001", "status": status },
        "payload": { "choices": { "status": status, "seq": 0, "text": [ { "content": text, "role": "assistant", "index": 0 } ] } }
    })
}

/// Recompute the signature the way the service does and compare.
fn assert_signed(uri: &str) {
    let url = Url::parse(&format!("ws://placeholder{uri}")).unwrap();
    let query = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| panic!("missing query parameter {name}"))
    };
    let host = query("host");
    let date = query("date");
    let descriptor = String::from_utf8(BASE64.decode(query("authorization")).unwrap()).unwrap();

    assert!(host.starts_with("127.0.0.1:"));
    assert!(date.ends_with(" GMT"));
    assert!(descriptor.contains(&format!("api_key=\"{API_KEY}\"")));

    let expected = sign(
        SECRET,
        &format!("host: {host}\ndate: {date}\nGET {} HTTP/1.1", url.path()),
    );
    assert!(descriptor.ends_with(&format!("signature=\"{expected}\"")));
}

#[tokio::test]
async fn test_streamed_reply_over_websocket() {
    let (port, observed) = spawn_server(Script::Reply(vec![
        content(0, "多喝水，"),
        content(1, "早睡早起"),
        content(2, "。"),
    ]))
    .await;

    let reply = client_for(port, 10)
        .send("如何保持健康？", Some("alice"), Some("心率: 72"))
        .await
        .unwrap();
    assert_eq!(reply, "多喝水，早睡早起。");

    let observed = observed.await.unwrap();
    assert_signed(&observed.uri);
    assert!(observed.uri.starts_with("/v1.1/chat?"));
    assert_eq!(observed.envelope["header"]["uid"], "alice");
    assert_eq!(
        observed.envelope["payload"]["message"]["text"][1],
        json!({ "role": "user", "content": "如何保持健康？" })
    );
    assert!(observed.client_closed);
}

#[tokio::test]
async fn test_remote_error_over_websocket() {
    let (port, observed) = spawn_server(Script::Reply(vec![json!({
        "header": { "code": 1, "message": "quota exceeded", "sid": "cht000b0002" }
    })]))
    .await;

    let result = client_for(port, 10).send("hello", None, None).await;
    match result {
        Err(SparkError::RemoteProtocol { code, message }) => {
            assert_eq!(code, 1);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert!(observed.await.unwrap().client_closed);
}

#[tokio::test]
async fn test_binary_frames_decoded_as_text() {
    let (port, observed) = spawn_server(Script::ReplyBinary(vec![
        content(1, "少吃").to_string().into_bytes(),
        content(2, "多动").to_string().into_bytes(),
    ]))
    .await;

    let reply = client_for(port, 10).send("hello", None, None).await.unwrap();
    assert_eq!(reply, "少吃多动");
    assert!(observed.await.unwrap().client_closed);
}

#[tokio::test]
async fn test_non_utf8_binary_frame_is_transport_error() {
    let (port, _observed) = spawn_server(Script::ReplyBinary(vec![vec![0xff, 0xfe]])).await;

    let outcome = client_for(port, 10)
        .send_with(ChatRequest::new("hello"), SendOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome.result, Err(SparkError::Transport(_))));
    assert_eq!(outcome.report.state, SessionState::Failed);
    assert_eq!(outcome.report.frames, 0);
}

#[tokio::test]
async fn test_server_close_without_final_frame() {
    let (port, _observed) =
        spawn_server(Script::ReplyThenClose(vec![content(1, "partial")])).await;

    let outcome = client_for(port, 10)
        .send_with(ChatRequest::new("hello"), SendOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome.result, Err(SparkError::IncompleteStream)));
    assert_eq!(outcome.report.state, SessionState::Failed);
    assert_eq!(outcome.report.frames, 1);
}

#[tokio::test]
async fn test_silent_server_hits_deadline() {
    let (port, observed) = spawn_server(Script::Silent).await;

    let outcome = client_for(port, 1)
        .send_with(ChatRequest::new("hello"), SendOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome.result, Err(SparkError::DeadlineExceeded(1))));
    assert_eq!(outcome.report.state, SessionState::TimedOut);
    assert!(outcome.report.elapsed >= std::time::Duration::from_secs(1));
    assert!(observed.await.unwrap().client_closed);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = client_for(port, 5).send("hello", None, None).await;
    assert!(matches!(result, Err(SparkError::Transport(_))));
}
