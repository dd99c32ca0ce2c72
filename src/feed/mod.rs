//! Feed ingestion: the push subscription and the history poll.
//!
//! Both feeds run as tokio tasks and only forward [`FeedEvent`]s over a
//! bounded channel. All state changes happen on the receiving side, in
//! arrival order. Dropping the [`FeedHandle`] stops both tasks.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::FeedsConfig;
use crate::error::Result;
use crate::task::TaskSnapshot;

pub mod history;
pub mod sse;

pub use history::fetch_history;
pub use sse::{SseDecoder, SseEvent};

/// What a feed delivered.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// One full snapshot from the push feed.
    Snapshot(TaskSnapshot),
    /// A push message that could not be decoded.
    Dropped(String),
    /// A complete history listing; empty after a failed poll.
    History(Vec<TaskSnapshot>),
    Connected,
    Disconnected,
}

/// Resolved feed endpoints and timings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub push_url: String,
    pub history_url: String,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub channel_capacity: usize,
}

impl FeedSettings {
    pub fn from_config(config: &FeedsConfig) -> Result<Self> {
        Ok(Self {
            push_url: join_url(&config.base_url, &config.sse_path),
            history_url: join_url(&config.base_url, &config.history_path),
            poll_interval: config.poll_interval()?,
            reconnect_delay: config.reconnect_delay()?,
            channel_capacity: config.channel_capacity,
        })
    }

    pub fn channel(&self) -> (mpsc::Sender<FeedEvent>, mpsc::Receiver<FeedEvent>) {
        mpsc::channel(self.channel_capacity.max(1))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("tskdash/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Owns the running feed tasks. Both are aborted on drop.
pub struct FeedHandle {
    push: Option<JoinHandle<()>>,
    poll: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Start the push feed and the history poll.
    pub fn spawn(settings: &FeedSettings, tx: mpsc::Sender<FeedEvent>) -> Result<Self> {
        let client = build_client()?;
        let push = tokio::spawn(sse::run_push(
            client.clone(),
            settings.push_url.clone(),
            settings.reconnect_delay,
            tx.clone(),
        ));
        let poll = tokio::spawn(history::run_poll(
            client,
            settings.history_url.clone(),
            settings.poll_interval,
            tx,
        ));
        Ok(Self {
            push: Some(push),
            poll: Some(poll),
        })
    }

    /// Start the push feed only.
    pub fn spawn_push(settings: &FeedSettings, tx: mpsc::Sender<FeedEvent>) -> Result<Self> {
        let client = build_client()?;
        let push = tokio::spawn(sse::run_push(
            client,
            settings.push_url.clone(),
            settings.reconnect_delay,
            tx,
        ));
        Ok(Self {
            push: Some(push),
            poll: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.push
            .iter()
            .chain(self.poll.iter())
            .any(|handle| !handle.is_finished())
    }

    pub fn shutdown(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for handle in [self.push.take(), self.poll.take()].into_iter().flatten() {
            handle.abort();
        }
        debug!("feeds stopped");
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}
