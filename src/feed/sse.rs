//! Push feed: a `text/event-stream` subscription.
//!
//! The decoder follows the event-stream wire format: `data:` lines are joined
//! with newlines, a blank line dispatches, lines starting with `:` are
//! comments, and `event`, `id` and `retry` fields are tracked. Only events of
//! the default `message` type carry task snapshots.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::task::decode_live;

use super::FeedEvent;

pub const DEFAULT_MAX_EVENT_BYTES: usize = 1024 * 1024;

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `message` unless the server named it.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SseError {
    #[error("line exceeds max size without terminator: {size} > {max}")]
    OversizedLine { size: usize, max: usize },
    #[error("event data exceeds max size: {size} > {max}")]
    OversizedEvent { size: usize, max: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SseReport {
    pub events: Vec<SseEvent>,
    pub errors: Vec<SseError>,
}

/// Incremental event-stream decoder fed with raw body chunks.
pub struct SseDecoder {
    max_event_bytes: usize,
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no line terminator.
    scanned: usize,
    /// The last line ended in `\r`; a `\n` that follows belongs to it.
    skip_lf: bool,
    data: String,
    event: Option<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
    saw_first_line: bool,
}

impl SseDecoder {
    pub fn new(max_event_bytes: usize) -> Self {
        Self {
            max_event_bytes,
            pending: Vec::new(),
            scanned: 0,
            skip_lf: false,
            data: String::new(),
            event: None,
            last_event_id: None,
            retry: None,
            saw_first_line: false,
        }
    }

    /// Reconnect delay requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> SseReport {
        let mut report = SseReport::default();
        self.pending.extend_from_slice(chunk);

        // Lines end in `\r\n`, `\n` or a lone `\r`.
        let mut start = 0;
        let mut scan_from = self.scanned;
        loop {
            if self.skip_lf && start < self.pending.len() {
                self.skip_lf = false;
                if self.pending[start] == b'\n' {
                    start += 1;
                    scan_from = scan_from.max(start);
                }
            }
            let Some(offset) = self.pending[scan_from..]
                .iter()
                .position(|byte| matches!(byte, b'\r' | b'\n'))
            else {
                break;
            };
            let end = scan_from + offset;
            self.skip_lf = self.pending[end] == b'\r';
            let text = String::from_utf8_lossy(&self.pending[start..end]).into_owned();
            self.process_line(&text, &mut report);
            start = end + 1;
            scan_from = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_event_bytes {
            report.errors.push(SseError::OversizedLine {
                size: self.pending.len(),
                max: self.max_event_bytes,
            });
            self.pending.clear();
            self.scanned = 0;
        }

        report
    }

    fn process_line(&mut self, line: &str, report: &mut SseReport) {
        let line = if self.saw_first_line {
            line
        } else {
            self.saw_first_line = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            self.dispatch(report);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.data.len() + value.len() + 1 > self.max_event_bytes {
                    report.errors.push(SseError::OversizedEvent {
                        size: self.data.len() + value.len() + 1,
                        max: self.max_event_bytes,
                    });
                    self.data.clear();
                    self.event = None;
                    return;
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, report: &mut SseReport) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        report.events.push(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_event_id.clone(),
        });
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_BYTES)
    }
}

async fn connect(client: &Client, url: &str, last_event_id: Option<&str>) -> Result<Response> {
    let mut request = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = last_event_id {
        request = request.header(LAST_EVENT_ID, id);
    }
    let response = request.send().await?.error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/event-stream") {
        return Err(Error::Feed {
            url: url.to_string(),
            message: format!("unexpected content type '{content_type}'"),
        });
    }
    Ok(response)
}

/// Forward decoded snapshots. Returns false once the receiver is gone.
async fn forward(report: SseReport, tx: &mpsc::Sender<FeedEvent>) -> bool {
    for err in report.errors {
        debug!(error = %err, "push frame dropped");
        if tx.send(FeedEvent::Dropped(err.to_string())).await.is_err() {
            return false;
        }
    }
    for event in report.events {
        if event.event != "message" {
            continue;
        }
        let message = match decode_live(&event.data) {
            Ok(snapshot) => FeedEvent::Snapshot(snapshot),
            Err(err) => {
                debug!(error = %err, "push message dropped");
                FeedEvent::Dropped(err.to_string())
            }
        };
        if tx.send(message).await.is_err() {
            return false;
        }
    }
    true
}

/// Keep one subscription open, reconnecting after `retry` whenever the stream
/// ends. Exits when the receiving side is dropped.
pub(crate) async fn run_push(
    client: Client,
    url: String,
    default_retry: Duration,
    tx: mpsc::Sender<FeedEvent>,
) {
    let mut retry = default_retry;
    let mut last_event_id: Option<String> = None;
    let mut connected = false;

    loop {
        match connect(&client, &url, last_event_id.as_deref()).await {
            Ok(response) => {
                info!(%url, "push feed connected");
                connected = true;
                if tx.send(FeedEvent::Connected).await.is_err() {
                    return;
                }

                let mut decoder = SseDecoder::default();
                let mut body = response.bytes_stream();
                while let Some(chunk) = body.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            warn!(%url, error = %err, "push feed read error");
                            break;
                        }
                    };
                    let report = decoder.push_chunk(&chunk);
                    if !forward(report, &tx).await {
                        return;
                    }
                }

                if let Some(server_retry) = decoder.retry() {
                    retry = server_retry;
                }
                if let Some(id) = decoder.last_event_id() {
                    last_event_id = Some(id.to_string());
                }
                info!(%url, "push feed closed");
            }
            Err(err) => {
                warn!(%url, error = %err, "push feed connect failed");
            }
        }

        if connected {
            connected = false;
            if tx.send(FeedEvent::Disconnected).await.is_err() {
                return;
            }
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(retry).await;
    }
}
