//! The task under detailed inspection, and what the operator may ask of it.

use crate::store::TaskStore;
use crate::task::{TaskSnapshot, TaskStatus};

/// At most one selected task.
///
/// Selection holds the task id plus the copy taken when it was selected.
/// [`Selection::resolve`] prefers the live store entry for that id, so a
/// selected live task follows later updates; the copy is only shown for tasks
/// the store does not know (history rows). A history row whose id is also on
/// the live feed therefore resolves to the live entry, which carries no
/// `createdAt`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: Option<TaskSnapshot>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, task: &TaskSnapshot) {
        self.current = Some(task.clone());
    }

    pub fn close(&mut self) {
        self.current = None;
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.current.as_ref().map(|task| task.id.as_str())
    }

    /// The copy taken at selection time.
    pub fn captured(&self) -> Option<&TaskSnapshot> {
        self.current.as_ref()
    }

    /// The snapshot to display.
    pub fn resolve<'a>(&'a self, store: &'a TaskStore) -> Option<&'a TaskSnapshot> {
        let captured = self.current.as_ref()?;
        store.get(&captured.id).or(Some(captured))
    }
}

/// Operator requests offered on a task. None of them reach the job system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    RunNow,
    Pause,
    Retry,
    Cancel,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Intent::RunNow => "run now",
            Intent::Pause => "pause",
            Intent::Retry => "retry",
            Intent::Cancel => "cancel",
        }
    }

    pub fn key(self) -> char {
        match self {
            Intent::RunNow => 'n',
            Intent::Pause => 'p',
            Intent::Retry => 'r',
            Intent::Cancel => 'x',
        }
    }

    /// Intents offered for a status. Cancel is always offered.
    pub fn available(status: &TaskStatus) -> Vec<Intent> {
        let mut intents = match status {
            TaskStatus::Pending => vec![Intent::RunNow],
            TaskStatus::Processing => vec![Intent::Pause],
            TaskStatus::Failed => vec![Intent::Retry],
            _ => Vec::new(),
        };
        intents.push(Intent::Cancel);
        intents
    }
}
