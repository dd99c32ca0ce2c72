//! Filtered and searched views over task sequences.
//!
//! Projections never mutate their input and are recomputed on every call.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::task::{TaskSnapshot, TaskStatus};

/// Tab selector: every task, or one status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    All,
    Status(TaskStatus),
}

impl Tab {
    /// Tabs in display order.
    pub fn all_tabs() -> Vec<Tab> {
        let mut tabs = vec![Tab::All];
        tabs.extend(TaskStatus::KNOWN.into_iter().map(Tab::Status));
        tabs
    }

    /// Parse `all` or a known status name.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Tab::All);
        }
        match TaskStatus::parse(trimmed) {
            TaskStatus::Unknown(_) => Err(Error::UnknownTab(trimmed.to_string())),
            status => Ok(Tab::Status(status)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tab::All => "all",
            Tab::Status(status) => status.as_str(),
        }
    }

    pub fn matches(&self, task: &TaskSnapshot) -> bool {
        match self {
            Tab::All => true,
            Tab::Status(status) => task.status == *status,
        }
    }
}

impl FromStr for Tab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tab::parse(s)
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tab plus search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub tab: Tab,
    pub query: String,
}

impl Filter {
    pub fn new(tab: Tab, query: impl Into<String>) -> Self {
        Self {
            tab,
            query: query.into(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.tab == Tab::All && self.query.is_empty()
    }

    pub fn matches(&self, task: &TaskSnapshot) -> bool {
        self.tab.matches(task) && matches_query(task, &self.query.to_lowercase())
    }
}

/// Lowercased query must be a substring of the name or the id.
fn matches_query(task: &TaskSnapshot, query_norm: &str) -> bool {
    if query_norm.is_empty() {
        return true;
    }
    task.name.to_lowercase().contains(query_norm) || task.id.to_lowercase().contains(query_norm)
}

/// Tasks passing `filter`, in input order.
pub fn project<'a, I>(tasks: I, filter: &Filter) -> Vec<&'a TaskSnapshot>
where
    I: IntoIterator<Item = &'a TaskSnapshot>,
{
    let query_norm = filter.query.to_lowercase();
    tasks
        .into_iter()
        .filter(|task| filter.tab.matches(task) && matches_query(task, &query_norm))
        .collect()
}

/// Position of `id` among `visible`, else the first row.
pub fn position_of(visible: &[&TaskSnapshot], id: Option<&str>) -> Option<usize> {
    if visible.is_empty() {
        return None;
    }
    id.and_then(|id| visible.iter().position(|task| task.id == id))
        .or(Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskStore;

    fn task(id: &str, name: &str, status: TaskStatus) -> TaskSnapshot {
        TaskSnapshot::new(id, name, status)
    }

    fn ids<'a>(visible: &[&'a TaskSnapshot]) -> Vec<&'a str> {
        visible.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn tab_filter_keeps_exact_status() {
        let tasks = vec![
            task("1", "a", TaskStatus::Completed),
            task("2", "b", TaskStatus::Failed),
        ];
        let filter = Filter::new(Tab::Status(TaskStatus::Completed), "");
        let visible = project(&tasks, &filter);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");
    }

    #[test]
    fn search_is_case_insensitive_on_name() {
        let tasks = vec![task("x1", "SendEmail", TaskStatus::Pending)];
        let visible = project(&tasks, &Filter::new(Tab::All, "email"));
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn search_matches_id() {
        let tasks = vec![
            task("job-42", "resize", TaskStatus::Pending),
            task("job-7", "resize", TaskStatus::Pending),
        ];
        let visible = project(&tasks, &Filter::new(Tab::All, "JOB-4"));
        assert_eq!(ids(&visible), vec!["job-42"]);
    }

    #[test]
    fn search_is_substring_not_subsequence() {
        let tasks = vec![task("a", "send-email", TaskStatus::Pending)];
        assert!(project(&tasks, &Filter::new(Tab::All, "sem")).is_empty());
    }

    #[test]
    fn tab_and_search_combine() {
        let tasks = vec![
            task("1", "SendEmail", TaskStatus::Failed),
            task("2", "SendEmail", TaskStatus::Completed),
            task("3", "Resize", TaskStatus::Failed),
        ];
        let visible = project(&tasks, &Filter::new(Tab::Status(TaskStatus::Failed), "send"));
        assert_eq!(ids(&visible), vec!["1"]);
    }

    #[test]
    fn identity_projection_equals_store() {
        let mut store = TaskStore::new();
        store.upsert(task("a", "one", TaskStatus::Pending));
        store.upsert(task("b", "two", TaskStatus::Failed));
        store.upsert(task("c", "three", TaskStatus::parse("paused")));

        let filter = Filter::default();
        assert!(filter.is_identity());
        let visible: Vec<TaskSnapshot> = project(store.iter(), &filter)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(visible, store.snapshots());
    }

    #[test]
    fn unknown_status_only_visible_under_all() {
        let tasks = vec![task("a", "one", TaskStatus::parse("paused"))];
        assert_eq!(project(&tasks, &Filter::default()).len(), 1);
        for status in TaskStatus::KNOWN {
            assert!(project(&tasks, &Filter::new(Tab::Status(status), "")).is_empty());
        }
    }

    #[test]
    fn tab_parse_accepts_all_and_statuses() {
        assert_eq!(Tab::parse("ALL").expect("tab"), Tab::All);
        assert_eq!(
            Tab::parse(" retrying ").expect("tab"),
            Tab::Status(TaskStatus::Retrying)
        );
        match Tab::parse("paused") {
            Err(Error::UnknownTab(value)) => assert_eq!(value, "paused"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(Tab::all_tabs().len(), 7);
    }

    #[test]
    fn selection_persists_by_id_or_falls_back() {
        let tasks = vec![
            task("t-1", "One", TaskStatus::Pending),
            task("t-2", "Two", TaskStatus::Pending),
        ];
        let visible = project(&tasks, &Filter::default());
        assert_eq!(position_of(&visible, Some("t-2")), Some(1));
        assert_eq!(position_of(&visible, Some("t-3")), Some(0));
        assert_eq!(position_of(&visible, None), Some(0));
        assert_eq!(position_of(&[], Some("t-1")), None);
    }
}
