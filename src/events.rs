//! Store change events for external consumers.
//!
//! `tskdash tail` emits one JSON line per store change to stdout or a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::UpsertOutcome;
use crate::task::{TaskSnapshot, TaskStatus};

pub const EVENT_SCHEMA_VERSION: &str = "tskdash.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// Store changes worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskInserted,
    TaskUpdated,
}

impl EventKind {
    /// Event for an upsert outcome; `None` when the store did not change.
    pub fn from_outcome(outcome: &UpsertOutcome) -> Option<Self> {
        match outcome {
            UpsertOutcome::Inserted => Some(EventKind::TaskInserted),
            UpsertOutcome::Replaced { .. } => Some(EventKind::TaskUpdated),
            UpsertOutcome::Unchanged | UpsertOutcome::Stale { .. } => None,
        }
    }
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event: EventKind, task_id: impl Into<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            task_id: task_id.into(),
            previous_status: None,
            data: None,
        }
    }

    /// Event describing `outcome` for `task`, if the store changed.
    pub fn for_change(task: &TaskSnapshot, outcome: &UpsertOutcome) -> Result<Option<Self>> {
        let Some(kind) = EventKind::from_outcome(outcome) else {
            return Ok(None);
        };
        let mut event = Event::new(kind, task.id.clone()).with_data(task)?;
        if let UpsertOutcome::Replaced { previous } = outcome {
            event.previous_status = Some(previous.clone());
        }
        Ok(Some(event))
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to any writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}
