//! tskdash tail command implementation
//!
//! Follows the push feed without a terminal UI. Every snapshot is reconciled
//! into a store exactly as the dashboard does it, and each change to a task
//! passing the filter is written as one JSON line.

use std::future::Future;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::dashboard::{Applied, Dashboard};
use crate::error::Result;
use crate::events::{Event, EventDestination, EventSink};
use crate::feed::{FeedEvent, FeedHandle, FeedSettings};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::projection::Filter;

/// Options for the tail command
pub struct TailOptions {
    pub settings: FeedSettings,
    pub filter: Filter,
    pub events: Option<String>,
    pub limit: Option<usize>,
    pub output: OutputOptions,
}

#[derive(Debug, Serialize)]
struct TailReport {
    emitted: usize,
    tracked: usize,
    dropped: u64,
}

pub async fn run(options: TailOptions) -> Result<()> {
    let destination =
        EventDestination::parse(options.events.as_deref()).unwrap_or(EventDestination::Stdout);
    let mut sink = destination.open()?;

    let (tx, mut rx) = options.settings.channel();
    let feeds = FeedHandle::spawn_push(&options.settings, tx)?;

    let mut dashboard = Dashboard::new(options.filter);
    let result = follow_until(
        &mut dashboard,
        &mut rx,
        &mut sink,
        options.limit,
        tokio::signal::ctrl_c(),
    )
    .await;
    feeds.shutdown();
    let emitted = result?;

    let report = TailReport {
        emitted,
        tracked: dashboard.store().len(),
        dropped: dashboard.decode_errors(),
    };
    if matches!(destination, EventDestination::Stdout) {
        return Ok(());
    }

    let mut human = HumanOutput::new("tskdash tail");
    human.push_summary("events", report.emitted.to_string());
    human.push_summary("tasks tracked", report.tracked.to_string());
    if report.dropped > 0 {
        human.push_warning(format!("{} undecodable message(s) dropped", report.dropped));
    }
    emit_success(options.output, "tail", &report, Some(&human))
}

/// Follow the feed until it ends, the limit is reached or `stop` resolves.
/// Returns the number of events written, including on interruption.
async fn follow_until<F: Future>(
    dashboard: &mut Dashboard,
    rx: &mut mpsc::Receiver<FeedEvent>,
    sink: &mut EventSink,
    limit: Option<usize>,
    stop: F,
) -> Result<usize> {
    let mut emitted = 0usize;
    tokio::select! {
        result = follow(dashboard, rx, sink, limit, &mut emitted) => result?,
        _ = stop => info!(emitted, "interrupted"),
    }
    Ok(emitted)
}

async fn follow(
    dashboard: &mut Dashboard,
    rx: &mut mpsc::Receiver<FeedEvent>,
    sink: &mut EventSink,
    limit: Option<usize>,
    emitted: &mut usize,
) -> Result<()> {
    while limit.map_or(true, |limit| *emitted < limit) {
        let Some(event) = rx.recv().await else {
            break;
        };
        let Applied::Store { id, outcome } = dashboard.apply(event) else {
            continue;
        };
        let Some(task) = dashboard.store().get(&id) else {
            continue;
        };
        if !dashboard.filter().matches(task) {
            continue;
        }
        if let Some(event) = Event::for_change(task, &outcome)? {
            sink.emit(&event)?;
            *emitted += 1;
        }
    }
    Ok(())
}
