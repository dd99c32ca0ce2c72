//! Dashboard state: the single owner of everything the feeds change.
//!
//! Feed events are applied one at a time, in the order they are received.
//! Presentation reads projections and the resolved selection; it never
//! touches the store directly.

use tracing::{debug, info};

use crate::feed::FeedEvent;
use crate::projection::{project, Filter, Tab};
use crate::selection::{Intent, Selection};
use crate::store::{StatusCounts, TaskStore, UpsertOutcome};
use crate::task::TaskSnapshot;

/// Which task list is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Live,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "live",
            ConnectionState::Disconnected => "reconnecting",
        }
    }
}

/// What applying one feed event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Store { id: String, outcome: UpsertOutcome },
    History { count: usize },
    Dropped,
    Connection(ConnectionState),
}

#[derive(Debug, Default)]
pub struct Dashboard {
    store: TaskStore,
    history: Vec<TaskSnapshot>,
    selection: Selection,
    filter: Filter,
    mode: ViewMode,
    connection: ConnectionState,
    decode_errors: u64,
}

impl Dashboard {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: FeedEvent) -> Applied {
        match event {
            FeedEvent::Snapshot(snapshot) => {
                let id = snapshot.id.clone();
                let outcome = self.store.upsert(snapshot);
                Applied::Store { id, outcome }
            }
            FeedEvent::Dropped(reason) => {
                self.decode_errors += 1;
                debug!(%reason, total = self.decode_errors, "feed message dropped");
                Applied::Dropped
            }
            FeedEvent::History(listing) => {
                let count = listing.len();
                self.history = listing;
                Applied::History { count }
            }
            FeedEvent::Connected => {
                self.connection = ConnectionState::Connected;
                Applied::Connection(self.connection)
            }
            FeedEvent::Disconnected => {
                self.connection = ConnectionState::Disconnected;
                Applied::Connection(self.connection)
            }
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Latest history listing, replaced wholesale by every poll.
    pub fn history(&self) -> &[TaskSnapshot] {
        &self.history
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn tab(&self) -> &Tab {
        &self.filter.tab
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.filter.tab = tab;
    }

    pub fn query(&self) -> &str {
        &self.filter.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Push messages dropped because they could not be decoded.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Visible rows for the current mode, tab and query.
    pub fn visible(&self) -> Vec<&TaskSnapshot> {
        match self.mode {
            ViewMode::Live => project(self.store.iter(), &self.filter),
            ViewMode::History => project(&self.history, &self.filter),
        }
    }

    /// Counts for the list currently shown, ignoring tab and query.
    pub fn status_counts(&self) -> StatusCounts {
        match self.mode {
            ViewMode::Live => self.store.status_counts(),
            ViewMode::History => StatusCounts::from_tasks(&self.history),
        }
    }

    pub fn select(&mut self, task: &TaskSnapshot) {
        self.selection.select(task);
    }

    pub fn close_selection(&mut self) {
        self.selection.close();
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The selected task as it should be displayed now.
    pub fn selected(&self) -> Option<&TaskSnapshot> {
        self.selection.resolve(&self.store)
    }

    /// Handle an operator intent on the selected task.
    ///
    /// Intents are not connected to the job system; the returned message says
    /// so, or explains why the intent does not apply.
    pub fn trigger(&self, intent: Intent) -> Option<String> {
        let task = self.selected()?;
        if !Intent::available(&task.status).contains(&intent) {
            return Some(format!(
                "{} is not offered for {} tasks",
                intent.label(),
                task.status
            ));
        }
        info!(task_id = %task.id, intent = intent.label(), "intent requested");
        Some(format!(
            "{} requested for {}: not wired to the job system",
            intent.label(),
            task.id
        ))
    }
}
