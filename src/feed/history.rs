//! Poll feed: periodic full fetch of the history listing.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::task::{decode_history, TaskSnapshot};

use super::FeedEvent;

/// Fetch and decode the history listing once.
pub async fn fetch_history(client: &Client, url: &str) -> Result<Vec<TaskSnapshot>> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    decode_history(&body)
}

/// Poll every `interval`, starting immediately. Any failure publishes an
/// empty listing so the history view never shows stale rows.
pub(crate) async fn run_poll(
    client: Client,
    url: String,
    interval: Duration,
    tx: mpsc::Sender<FeedEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let listing = match fetch_history(&client, &url).await {
            Ok(listing) => {
                debug!(%url, count = listing.len(), "history polled");
                listing
            }
            Err(err) => {
                warn!(%url, error = %err, "history poll failed");
                Vec::new()
            }
        };
        if tx.send(FeedEvent::History(listing)).await.is_err() {
            return;
        }
    }
}
