//! tskdash history command implementation
//!
//! Fetches the history listing once, applies tab and search, and prints it.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::feed::{build_client, fetch_history};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::projection::{project, Filter};
use crate::store::StatusCounts;
use crate::task::{format_timestamp, TaskSnapshot};

/// Options for the history command
pub struct HistoryOptions {
    pub url: String,
    pub filter: Filter,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct HistoryReport<'a> {
    url: &'a str,
    tab: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    query: &'a str,
    total: usize,
    shown: usize,
    counts: BTreeMap<String, usize>,
    tasks: Vec<&'a TaskSnapshot>,
}

pub async fn run(options: HistoryOptions) -> Result<()> {
    let client = build_client()?;
    let listing = fetch_history(&client, &options.url).await?;
    debug!(url = %options.url, count = listing.len(), "history fetched");

    let visible = project(&listing, &options.filter);
    let counts = StatusCounts::from_tasks(&listing);

    let mut human = HumanOutput::new("tskdash history");
    human.push_summary("source", options.url.clone());
    human.push_summary("tab", options.filter.tab.to_string());
    if !options.filter.query.is_empty() {
        human.push_summary("query", options.filter.query.clone());
    }
    human.push_summary("shown", format!("{} of {}", visible.len(), listing.len()));
    for task in &visible {
        human.push_detail(format_row(task));
    }
    if counts.unknown > 0 {
        human.push_warning(format!(
            "{} task(s) with an unrecognized status",
            counts.unknown
        ));
    }
    if listing.is_empty() {
        human.push_next_step("tskdash watch");
    } else if visible.is_empty() {
        human.push_next_step("tskdash history --tab all");
    }

    let report = HistoryReport {
        url: &options.url,
        tab: options.filter.tab.as_str(),
        query: &options.filter.query,
        total: listing.len(),
        shown: visible.len(),
        counts: count_map(&counts),
        tasks: visible,
    };

    emit_success(options.output, "history", &report, Some(&human))
}

fn count_map(counts: &StatusCounts) -> BTreeMap<String, usize> {
    let mut map: BTreeMap<String, usize> = counts
        .known()
        .map(|(status, count)| (status.to_string(), count))
        .collect();
    if counts.unknown > 0 {
        map.insert("unknown".to_string(), counts.unknown);
    }
    map
}

fn format_row(task: &TaskSnapshot) -> String {
    let created = task
        .created_at
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<14} {:<10} {:<19} {}",
        task.id,
        task.status.as_str(),
        created,
        task.name
    )
}
