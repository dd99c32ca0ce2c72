mod support;

use std::time::Duration;

use assert_cmd::Command;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use tskdash::dashboard::{ConnectionState, Dashboard};
use tskdash::feed::{build_client, fetch_history, FeedEvent, FeedHandle, FeedSettings};
use tskdash::task::TaskStatus;

use support::{task_json, MockJobSystem};

const WAIT: Duration = Duration::from_secs(10);

fn history_fixture() -> Value {
    json!([
        {
            "id": "h1",
            "name": "report",
            "status": "completed",
            "payload": "{\"rows\":3}",
            "createdAt": "2024-05-01T10:00:00Z"
        },
        {
            "id": "h2",
            "name": "send-email",
            "status": "failed",
            "payload": {"to": "ops@example.com"},
            "createdAt": "2024-05-01T10:05:00Z"
        }
    ])
}

fn push_fixture() -> MockJobSystem {
    MockJobSystem::new()
        .retry(Duration::from_millis(50))
        .frame(task_json("t1", "send-email", "pending"))
        .frame("{not json")
        .named_frame("stats", r#"{"queued":4}"#)
        .frame(task_json("t1", "send-email", "processing"))
        .history(history_fixture())
}

async fn next_event(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for feed")
        .expect("feed closed")
}

#[tokio::test]
async fn push_updates_reconcile_to_one_entry() {
    let server = push_fixture().start().await;
    let settings = server.settings();
    let (tx, mut rx) = settings.channel();
    let _feeds = FeedHandle::spawn_push(&settings, tx).expect("spawn");

    let mut dashboard = Dashboard::default();
    let mut snapshots = 0;
    while snapshots < 2 {
        let event = next_event(&mut rx).await;
        if matches!(event, FeedEvent::Snapshot(_)) {
            snapshots += 1;
        }
        dashboard.apply(event);
    }

    assert_eq!(dashboard.connection(), ConnectionState::Connected);
    assert_eq!(dashboard.store().len(), 1);
    assert_eq!(
        dashboard.store().get("t1").map(|task| &task.status),
        Some(&TaskStatus::Processing)
    );
    assert_eq!(dashboard.decode_errors(), 1);
}

#[tokio::test]
async fn push_feed_reconnects_after_stream_ends() {
    let server = push_fixture().start().await;
    let settings = server.settings();
    let (tx, mut rx) = settings.channel();
    let _feeds = FeedHandle::spawn_push(&settings, tx).expect("spawn");

    let mut dashboard = Dashboard::default();
    let mut connects = 0;
    let mut disconnects = 0;
    while connects < 2 {
        let event = next_event(&mut rx).await;
        match event {
            FeedEvent::Connected => connects += 1,
            FeedEvent::Disconnected => disconnects += 1,
            _ => {}
        }
        dashboard.apply(event);
    }

    assert!(disconnects >= 1);
    // replayed snapshots do not duplicate entries
    assert_eq!(dashboard.store().len(), 1);
    assert_eq!(
        dashboard.store().get("t1").map(|task| &task.status),
        Some(&TaskStatus::Processing)
    );
}

#[tokio::test]
async fn history_fetch_decodes_and_normalizes() {
    let server = push_fixture().start().await;
    let settings = server.settings();
    let client = build_client().expect("client");

    let listing = fetch_history(&client, &settings.history_url)
        .await
        .expect("history");
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].id, "h1");
    assert_eq!(listing[0].payload.get("rows"), Some(&json!(3)));
    assert!(listing[0].created_at.is_some());
    assert_eq!(listing[1].status, TaskStatus::Failed);
}

#[tokio::test]
async fn failed_poll_clears_history_view() {
    let server = push_fixture().start().await;
    let client = build_client().expect("client");
    let good = server.settings();

    let mut dashboard = Dashboard::default();
    let listing = fetch_history(&client, &good.history_url)
        .await
        .expect("history");
    dashboard.apply(FeedEvent::History(listing));
    assert_eq!(dashboard.history().len(), 2);

    let mut config = server.feeds_config();
    config.history_path = "/api/history-broken".to_string();
    let broken = FeedSettings::from_config(&config).expect("settings");
    let (tx, mut rx) = broken.channel();
    let _feeds = FeedHandle::spawn(&broken, tx).expect("spawn");

    loop {
        if let FeedEvent::History(listing) = next_event(&mut rx).await {
            dashboard.apply(FeedEvent::History(listing));
            break;
        }
    }
    assert!(dashboard.history().is_empty());
}

#[tokio::test]
async fn dropping_handle_stops_feeds() {
    let server = push_fixture().start().await;
    let settings = server.settings();
    let (tx, mut rx) = settings.channel();
    let feeds = FeedHandle::spawn(&settings, tx).expect("spawn");

    next_event(&mut rx).await;
    drop(feeds);

    // every sender lives in an aborted task, so the channel drains and closes
    let closed = timeout(WAIT, async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn tail_command_streams_store_changes() {
    let server = push_fixture().start().await;
    let base_url = server.base_url();

    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().expect("tempdir");
        Command::cargo_bin("tskdash")
            .expect("binary")
            .current_dir(dir.path())
            .env("XDG_CONFIG_HOME", dir.path())
            .args(["--base-url", &base_url, "tail", "--limit", "2"])
            .timeout(Duration::from_secs(30))
            .output()
            .expect("run")
    })
    .await
    .expect("join");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let events: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["schema_version"], "tskdash.event.v1");
    assert_eq!(events[0]["event"], "task_inserted");
    assert_eq!(events[0]["task_id"], "t1");
    assert_eq!(events[1]["event"], "task_updated");
    assert_eq!(events[1]["previous_status"], "pending");
    assert_eq!(events[1]["data"]["status"], "processing");
}

#[tokio::test(flavor = "multi_thread")]
async fn history_command_filters_by_tab() {
    let server = push_fixture().start().await;
    let base_url = server.base_url();

    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().expect("tempdir");
        Command::cargo_bin("tskdash")
            .expect("binary")
            .current_dir(dir.path())
            .env("XDG_CONFIG_HOME", dir.path())
            .args(["--json", "--base-url", &base_url, "history", "--tab", "failed"])
            .timeout(Duration::from_secs(30))
            .output()
            .expect("run")
    })
    .await
    .expect("join");

    assert!(output.status.success());
    let envelope: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["schema_version"], "tskdash.v1");
    assert_eq!(envelope["command"], "history");
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["total"], 2);
    assert_eq!(envelope["data"]["shown"], 1);
    assert_eq!(envelope["data"]["tasks"][0]["id"], "h2");
    assert_eq!(envelope["data"]["counts"]["completed"], 1);
}
