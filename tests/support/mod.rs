//! Mock job system for feed integration tests.
//!
//! Serves an event stream at `/sse` that replays its frames on every
//! connection and then closes, a history listing at `/api/history`, and a
//! history endpoint that always fails at `/api/history-broken`.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tskdash::config::FeedsConfig;
use tskdash::feed::FeedSettings;

#[derive(Debug, Clone, Default)]
pub struct MockJobSystem {
    frames: Vec<(Option<String>, String)>,
    history: Value,
    retry: Option<Duration>,
}

struct MockState {
    frames: Vec<(Option<String>, String)>,
    history: Value,
    retry: Option<Duration>,
}

impl MockJobSystem {
    pub fn new() -> Self {
        Self {
            history: Value::Array(Vec::new()),
            ..Self::default()
        }
    }

    /// Add a default-type event carrying `data`.
    pub fn frame(mut self, data: impl Into<String>) -> Self {
        self.frames.push((None, data.into()));
        self
    }

    /// Add an event with an explicit event type.
    pub fn named_frame(mut self, event: impl Into<String>, data: impl Into<String>) -> Self {
        self.frames.push((Some(event.into()), data.into()));
        self
    }

    pub fn history(mut self, history: Value) -> Self {
        self.history = history;
        self
    }

    /// Send a `retry` field before the frames.
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub async fn start(self) -> MockServer {
        let state = Arc::new(MockState {
            frames: self.frames,
            history: self.history,
            retry: self.retry,
        });

        let app = Router::new()
            .route("/sse", get(sse_handler))
            .route("/api/history", get(history_handler))
            .route("/api/history-broken", get(broken_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        MockServer {
            addr,
            _handle: handle,
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Feed config pointing at this server with short timings.
    pub fn feeds_config(&self) -> FeedsConfig {
        FeedsConfig {
            base_url: self.base_url(),
            poll_interval: "50ms".to_string(),
            reconnect_delay: "50ms".to_string(),
            ..FeedsConfig::default()
        }
    }

    pub fn settings(&self) -> FeedSettings {
        FeedSettings::from_config(&self.feeds_config()).expect("settings")
    }
}

async fn sse_handler(
    State(state): State<Arc<MockState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = Vec::new();
    if let Some(retry) = state.retry {
        events.push(Event::default().retry(retry));
    }
    for (name, data) in &state.frames {
        let mut event = Event::default().data(data.clone());
        if let Some(name) = name {
            event = event.event(name.clone());
        }
        events.push(event);
    }
    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

async fn history_handler(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(state.history.clone())
}

async fn broken_handler() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

pub fn task_json(id: &str, name: &str, status: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "status": status,
        "payload": {},
    })
    .to_string()
}
