//! HTTP client tests against a canned-response server on localhost.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use discussion_viewer::api::ApiClient;
use discussion_viewer::error::ViewerError;
use discussion_viewer::model::{DiscussionStatus, TurnRequest};

/// Request as seen by the stub: head (request line + headers) and body.
#[derive(Debug, Clone)]
struct Seen {
    head: String,
    body: String,
}

/// Serve `responses` in order, one connection each, recording requests.
async fn stub(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let len = head
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            while buf.len() < head_end + len {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }
            let req_body = String::from_utf8_lossy(&buf[head_end..head_end + len]).to_string();
            log.lock().unwrap().push(Seen { head, body: req_body });

            let resp = format!(
                "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        }
    });
    (format!("http://{addr}"), seen)
}

#[tokio::test]
async fn get_discussion_decodes_snapshot() {
    let (url, seen) = stub(vec![(
        200,
        r#"{"discussion_id":"d1","status":"waiting_for_vote","transcript":[{"agent_name":"사회자","message":"시작"}]}"#,
    )])
    .await;
    let api = ApiClient::builder(url).build();
    let snap = api.get_discussion("d1", "tok").await.unwrap();

    assert_eq!(snap.status, DiscussionStatus::WaitingForVote);
    assert_eq!(snap.transcript.len(), 1);
    let req = seen.lock().unwrap()[0].clone();
    assert!(req.head.starts_with("GET /api/v1/discussions/d1 "));
    assert!(req.head.to_ascii_lowercase().contains("authorization: bearer tok"));
}

#[tokio::test]
async fn unauthorized_maps_to_dedicated_error() {
    let (url, _) = stub(vec![(401, r#"{"detail":"Not authenticated"}"#)]).await;
    let api = ApiClient::builder(url).build();
    let err = api.get_discussion("d1", "stale").await.unwrap_err();
    assert!(matches!(err, ViewerError::Unauthorized));
}

#[tokio::test]
async fn detail_body_becomes_rejection() {
    let (url, _) = stub(vec![(400, r#"{"detail":"Incorrect email or password"}"#)]).await;
    let api = ApiClient::builder(url).build();
    let err = api.login("a@b.com", "bad").await.unwrap_err();
    match err {
        ViewerError::Rejected { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Incorrect email or password");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn bare_server_error_is_http_error() {
    let (url, _) = stub(vec![(500, "oops")]).await;
    let api = ApiClient::builder(url).build();
    let err = api.get_progress("d1", "tok").await.unwrap_err();
    assert!(matches!(err, ViewerError::Http { status: 500, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_snapshot_is_rejected() {
    let (url, _) = stub(vec![(200, r#"{"discussion_id":"d1","status":"no_such_status"}"#)]).await;
    let api = ApiClient::builder(url).build();
    let err = api.get_discussion("d1", "tok").await.unwrap_err();
    assert!(matches!(err, ViewerError::Malformed { .. }));
}

#[tokio::test]
async fn login_posts_form_fields() {
    let (url, seen) = stub(vec![(200, r#"{"access_token":"abc","token_type":"bearer"}"#)]).await;
    let api = ApiClient::builder(url).build();
    let token = api.login("a@b.com", "pw").await.unwrap();

    assert_eq!(token.access_token, "abc");
    let req = seen.lock().unwrap()[0].clone();
    assert!(req.head.starts_with("POST /api/v1/login/token "));
    assert!(req.body.contains("username=a%40b.com"));
    assert!(req.body.contains("password=pw"));
}

#[tokio::test]
async fn submit_turn_omits_absent_overrides() {
    let (url, seen) = stub(vec![(202, r#"{"status":"accepted"}"#)]).await;
    let api = ApiClient::builder(url).build();
    let body = TurnRequest { user_vote: Some("A".into()), model_overrides: None };
    api.submit_turn("d1", "tok", &body).await.unwrap();

    let req = seen.lock().unwrap()[0].clone();
    let json: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(json, serde_json::json!({"user_vote": "A"}));
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ApiClient::builder(format!("http://{addr}")).build();
    let err = api.archive("d1", "tok").await.unwrap_err();
    assert!(matches!(err, ViewerError::Connect { .. }));
    assert!(err.is_transient());
}
