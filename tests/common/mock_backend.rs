//! In-process stand-in for the backend API.
//!
//! Responses are scripted per endpoint (path relative to `/api/v1`) or
//! through a shared FIFO that serves any path. Unscripted requests get
//! `200 {}`.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    /// Error in the backend's `{"detail": ...}` shape.
    pub fn error(status: u16, detail: &str) -> Self {
        Self {
            status,
            ..Self::json(&serde_json::json!({ "detail": detail }).to_string())
        }
    }

    /// Finite event stream: one `event: notification` frame per message.
    pub fn sse(messages: &[&str]) -> Self {
        let body: String = messages
            .iter()
            .map(|m| format!("event: notification\ndata: {m}\n\n"))
            .collect();
        Self {
            status: 200,
            content_type: "text/event-stream",
            body: body.into_bytes(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        response.headers_mut().insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static(self.content_type),
        );
        response
    }
}

#[derive(Default)]
struct Script {
    requests: Mutex<Vec<CapturedRequest>>,
    by_route: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    any_route: Mutex<VecDeque<MockResponse>>,
}

impl Script {
    fn next_for(&self, route: &str) -> MockResponse {
        let scripted = self
            .by_route
            .lock()
            .get_mut(route)
            .and_then(VecDeque::pop_front);
        scripted
            .or_else(|| self.any_route.lock().pop_front())
            .unwrap_or_else(|| MockResponse::json("{}"))
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    script: Arc<Script>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let script = Arc::new(Script::default());
        let (shutdown, mut shutdown_rx) = tokio::sync::watch::channel(false);

        let app = Router::new().fallback(handle).with_state(script.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            script,
            shutdown,
        }
    }

    /// Serve `resp` for the next request to any path not scripted by route.
    pub async fn enqueue_response(&self, resp: MockResponse) {
        self.script.any_route.lock().push_back(resp);
    }

    /// Serve `resp` for the next request to `route`, e.g. `/notifications`.
    pub fn respond_to(&self, route: &str, resp: MockResponse) {
        self.script
            .by_route
            .lock()
            .entry(route.to_string())
            .or_default()
            .push_back(resp);
    }

    pub async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.script.requests.lock().clone()
    }

    /// Captured requests whose path is `route` under the API prefix.
    pub fn requests_to(&self, route: &str) -> Vec<CapturedRequest> {
        let full = format!("{API_PREFIX}{route}");
        self.script
            .requests
            .lock()
            .iter()
            .filter(|r| r.path == full)
            .cloned()
            .collect()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn handle(
    State(script): State<Arc<Script>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let route = path.strip_prefix(API_PREFIX).unwrap_or(&path).to_string();

    script.requests.lock().push(CapturedRequest {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        body: body.to_vec(),
    });

    let resp = script.next_for(&route);
    if !resp.delay.is_zero() {
        tokio::time::sleep(resp.delay).await;
    }
    resp.into_response()
}
