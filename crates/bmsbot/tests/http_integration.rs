//! HTTP integration tests.
//!
//! Exercises the health source and the Slack notifier against a minimal
//! mock HTTP server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bms_router::{format_status_line, Notifier, RouterError};
use bmsbot::error::BotError;
use bmsbot::source::{HealthSource, HttpHealthSource};
use bmsbot::{CommandRegistry, SlackNotifier};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

// ============================================================================
// Test Helpers - Mock HTTP Server
// ============================================================================

/// A captured request: request line and body.
#[derive(Debug, Clone)]
struct Captured {
    request_line: String,
    headers: String,
    body: String,
}

/// Serves canned responses, one per connection, and records the requests.
struct MockHttp {
    addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockHttp {
    /// Starts a server answering every request with `route(path)`.
    async fn start<F>(route: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured = Arc::new(Mutex::new(Vec::new()));
        let log = captured.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                let path = request
                    .request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                log.lock().unwrap().push(request);

                let (status, body) = route(&path);
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.ok();
                stream.shutdown().await.ok();
            }
        });

        Self { addr, captured }
    }

    fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        assert!(n > 0, "connection closed before headers");
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines.collect::<Vec<_>>().join("\n");
    let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string();

    Captured {
        request_line,
        headers,
        body,
    }
}

fn health_api(path: &str) -> (u16, String) {
    match path {
        "/ns/" => (
            200,
            r#"[
                {"kind": "Namespace", "name": "tenant1-prod", "healthy": "True"},
                {"kind": "Namespace", "name": "tenant1-dev", "healthy": "False", "errors": ["disk full"]}
            ]"#
            .to_string(),
        ),
        "/ns/tenant1-dev" => (
            200,
            r#"{"kind": "Namespace", "name": "tenant1-dev", "healthy": "False", "errors": ["disk full"]}"#
                .to_string(),
        ),
        "/ns/broken" => (500, r#"{"detail": "boom"}"#.to_string()),
        _ => (404, r#"{"detail": "not found"}"#.to_string()),
    }
}

// ============================================================================
// Health Source Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_all() {
    let server = MockHttp::start(health_api).await;
    let source = HttpHealthSource::new(&server.base()).unwrap();

    let updates = timeout(Duration::from_secs(5), source.fetch_all())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].name(), "tenant1-dev");
    assert_eq!(updates[1].errors(), ["disk full"]);
    assert!(server.requests()[0].request_line.starts_with("GET /ns/ "));
}

#[tokio::test]
async fn test_fetch_one() {
    let server = MockHttp::start(health_api).await;
    let source = HttpHealthSource::new(&server.base()).unwrap();

    let update = source.fetch_one("tenant1-dev").await.unwrap();
    assert_eq!(
        format_status_line(&update, false).text,
        ":x: [Namespace] tenant1-dev state: Unhealthy."
    );
}

#[tokio::test]
async fn test_fetch_one_not_found() {
    let server = MockHttp::start(health_api).await;
    let source = HttpHealthSource::new(&server.base()).unwrap();

    let err = source.fetch_one("missing").await.unwrap_err();
    assert!(matches!(err, BotError::NotFound(ref name) if name == "missing"));
}

#[tokio::test]
async fn test_fetch_one_server_error() {
    let server = MockHttp::start(health_api).await;
    let source = HttpHealthSource::new(&server.base()).unwrap();

    let err = source.fetch_one("broken").await.unwrap_err();
    assert!(matches!(err, BotError::Source(_)));
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_mention_over_http() {
    let server = MockHttp::start(health_api).await;
    let registry = CommandRegistry::new(Arc::new(HttpHealthSource::new(&server.base()).unwrap()));

    let reply = registry.dispatch("<@U123> health of tenant1-dev").await;
    assert_eq!(reply.text, ":x: [Namespace] tenant1-dev state: Unhealthy.");

    let reply = registry.dispatch("<@U123> health").await;
    assert!(reply.render_text().contains("*tenant1-dev*: 1 errors, 0 warnings."));

    let reply = registry.select_action("missing").await;
    assert_eq!(reply.text, "I could not find a resource named `missing`.");
}

// ============================================================================
// Slack Notifier Tests
// ============================================================================

#[tokio::test]
async fn test_slack_post_message() {
    let server = MockHttp::start(|_| (200, r#"{"ok": true}"#.to_string())).await;
    let notifier = SlackNotifier::new(&format!("{}/api", server.base()), "xoxb-test").unwrap();
    let update = bms_proto::HealthUpdate::from_json(
        r#"{"kind": "Namespace", "name": "foo", "healthy": "False"}"#,
    )
    .unwrap();

    notifier
        .send("#ops", &format_status_line(&update, true))
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].request_line.starts_with("POST /api/chat.postMessage "));
    assert!(requests[0]
        .headers
        .to_ascii_lowercase()
        .contains("authorization: bearer xoxb-test"));

    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "#ops");
    assert_eq!(body["text"], ":x: [Namespace] foo state: Unhealthy.");
    assert_eq!(body["blocks"][0]["type"], "section");
}

#[tokio::test]
async fn test_slack_api_error_is_delivery_error() {
    let server =
        MockHttp::start(|_| (200, r#"{"ok": false, "error": "channel_not_found"}"#.to_string()))
            .await;
    let notifier = SlackNotifier::new(&server.base(), "xoxb-test").unwrap();
    let message = bms_router::Message {
        text: "hello".to_string(),
        blocks: Vec::new(),
    };

    let err = notifier.send("#nope", &message).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::Delivery { ref channel, ref reason } if channel == "#nope" && reason == "channel_not_found"
    ));
}

#[tokio::test]
async fn test_slack_http_error_is_delivery_error() {
    let server = MockHttp::start(|_| (503, "{}".to_string())).await;
    let notifier = SlackNotifier::new(&server.base(), "xoxb-test").unwrap();
    let message = bms_router::Message {
        text: "hello".to_string(),
        blocks: Vec::new(),
    };

    let err = notifier.send("#ops", &message).await.unwrap_err();
    assert!(matches!(err, RouterError::Delivery { .. }));
}
