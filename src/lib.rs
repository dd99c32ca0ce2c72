//! tskdash - live task dashboard library
//!
//! This library provides the core functionality for the tskdash CLI: it
//! follows a job system's task events and presents them as a filterable,
//! searchable view.
//!
//! # Core Concepts
//!
//! - **Snapshots**: every message carries a task's full state, never a delta
//! - **Reconciliation**: snapshots merge into a store keyed by task id; the
//!   latest snapshot wins and first-seen order is kept
//! - **Projections**: tab and search views recomputed from the store
//! - **Feeds**: a push subscription for live tasks and a periodic poll for
//!   history, both delivering into one single-threaded owner
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.tskdash.toml`
//! - `dashboard`: State owner applying feed events in arrival order
//! - `error`: Error types and result aliases
//! - `events`: JSONL store change events
//! - `feed`: Event-stream subscription and history poll
//! - `output`: Human and JSON command output
//! - `projection`: Tab and search filtering
//! - `selection`: Selected task and operator intents
//! - `store`: Reconciliation store
//! - `task`: Task snapshot data model and wire decoding
//! - `ui`: Terminal dashboard

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod feed;
pub mod output;
pub mod projection;
pub mod selection;
pub mod store;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
