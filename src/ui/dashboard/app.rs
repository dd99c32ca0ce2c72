use std::io;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use crate::dashboard::{Applied, Dashboard, ViewMode};
use crate::error::Result;
use crate::feed::{FeedEvent, FeedHandle, FeedSettings};
use crate::projection::{position_of, Tab};
use crate::selection::Intent;
use crate::store::UpsertOutcome;
use crate::task::TaskSnapshot;

use super::view;

const NARROW_WIDTH: u16 = 90;

#[derive(Clone, Copy)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

#[derive(Default, Clone, Copy)]
struct Viewport {
    width: u16,
    height: u16,
}

pub struct AppState {
    pub(crate) dashboard: Dashboard,
    pub(crate) tabs: Vec<Tab>,
    /// Row under the cursor, by id, so it survives reordering and filtering.
    cursor_id: Option<String>,
    pub(crate) search_active: bool,
    pub(crate) show_detail: bool,
    info_message: Option<String>,
    error_message: Option<String>,
    viewport: Viewport,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            tabs: Tab::all_tabs(),
            cursor_id: None,
            search_active: false,
            show_detail: false,
            info_message: None,
            error_message: None,
            viewport: Viewport::default(),
        }
    }

    fn update_viewport(&mut self, width: u16, height: u16) {
        let changed = self.viewport.width != width || self.viewport.height != height;
        self.viewport = Viewport { width, height };
        if changed && width >= NARROW_WIDTH {
            self.show_detail = true;
        }
    }

    pub(crate) fn is_narrow(&self) -> bool {
        self.viewport.width > 0 && self.viewport.width < NARROW_WIDTH
    }

    pub(crate) fn visible(&self) -> Vec<&TaskSnapshot> {
        self.dashboard.visible()
    }

    /// Cursor position within the visible rows.
    pub(crate) fn cursor(&self) -> Option<usize> {
        position_of(&self.visible(), self.cursor_id.as_deref())
    }

    pub(crate) fn list_title(&self) -> &'static str {
        match self.dashboard.mode() {
            ViewMode::Live => "Live tasks",
            ViewMode::History => "History",
        }
    }

    pub(crate) fn tab_index(&self) -> usize {
        self.tabs
            .iter()
            .position(|tab| tab == self.dashboard.tab())
            .unwrap_or(0)
    }

    pub(crate) fn status_line(&self) -> Option<(String, StatusKind)> {
        if let Some(error) = self.error_message.as_ref() {
            return Some((error.clone(), StatusKind::Error));
        }
        if let Some(info) = self.info_message.as_ref() {
            return Some((info.clone(), StatusKind::Info));
        }
        if !self.dashboard.query().is_empty() {
            return Some((
                format!("search: {}", self.dashboard.query()),
                StatusKind::Info,
            ));
        }
        None
    }

    pub(crate) fn footer_hint(&self) -> String {
        if self.search_active {
            return "type to search  backspace delete  enter done  esc clear".to_string();
        }
        if self.dashboard.selection().is_open() {
            let intents = self
                .dashboard
                .selected()
                .map(|task| {
                    Intent::available(&task.status)
                        .into_iter()
                        .map(|intent| format!("{} {}", intent.key(), intent.label()))
                        .collect::<Vec<_>>()
                        .join("  ")
                })
                .unwrap_or_default();
            return format!("{intents}  j/k move  enter inspect  esc close  q quit");
        }
        "1-7/tab filter  / search  j/k move  enter inspect  h history  q quit".to_string()
    }

    pub(crate) fn task_count_summary(&self) -> String {
        let counts = self.dashboard.status_counts();
        let mut segments = vec![
            self.dashboard.connection().label().to_string(),
            format!("tasks: {}", counts.total),
        ];
        segments.extend(
            counts
                .known()
                .filter(|(_, count)| *count > 0)
                .map(|(status, count)| format!("{status}: {count}")),
        );
        if counts.unknown > 0 {
            segments.push(format!("other: {}", counts.unknown));
        }
        if self.dashboard.decode_errors() > 0 {
            segments.push(format!("dropped: {}", self.dashboard.decode_errors()));
        }
        segments.join("  ")
    }

    pub(crate) fn apply_feed(&mut self, event: FeedEvent) {
        match self.dashboard.apply(event) {
            Applied::Store {
                outcome: UpsertOutcome::Inserted,
                ..
            } if self.cursor_id.is_none() => self.sync_cursor(),
            Applied::History { .. } if self.dashboard.mode() == ViewMode::History => {
                self.sync_cursor()
            }
            _ => {}
        }
    }

    /// Keep the cursor on its task when still visible, else the first row.
    fn sync_cursor(&mut self) {
        self.cursor_id = {
            let visible = self.visible();
            position_of(&visible, self.cursor_id.as_deref()).map(|pos| visible[pos].id.clone())
        };
    }

    fn move_cursor(&mut self, delta: isize) {
        self.cursor_id = {
            let visible = self.visible();
            position_of(&visible, self.cursor_id.as_deref()).map(|current| {
                let max = visible.len().saturating_sub(1);
                let next = (current as isize + delta).clamp(0, max as isize) as usize;
                visible[next].id.clone()
            })
        };
    }

    fn set_tab(&mut self, index: usize) {
        if let Some(tab) = self.tabs.get(index).cloned() {
            self.dashboard.set_tab(tab);
            self.sync_cursor();
        }
    }

    fn cycle_tab(&mut self, delta: isize) {
        let len = self.tabs.len() as isize;
        let next = (self.tab_index() as isize + delta).rem_euclid(len);
        self.set_tab(next as usize);
    }

    fn toggle_mode(&mut self) {
        let next = match self.dashboard.mode() {
            ViewMode::Live => ViewMode::History,
            ViewMode::History => ViewMode::Live,
        };
        self.dashboard.set_mode(next);
        self.sync_cursor();
    }

    fn select_cursor(&mut self) {
        let task = self
            .visible()
            .get(self.cursor().unwrap_or(0))
            .map(|task| (*task).clone());
        match task {
            Some(task) => {
                self.dashboard.select(&task);
                if self.is_narrow() {
                    self.show_detail = true;
                }
            }
            None => self.set_error("no task under cursor".to_string()),
        }
    }

    fn trigger(&mut self, intent: Intent) {
        match self.dashboard.trigger(intent) {
            Some(message) => self.set_info(message),
            None => self.set_error("no task selected".to_string()),
        }
    }

    fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
        self.info_message = None;
    }

    fn set_info(&mut self, message: String) {
        self.info_message = Some(message);
        self.error_message = None;
    }

    fn clear_messages(&mut self) {
        self.info_message = None;
        self.error_message = None;
    }
}

/// Run the live dashboard until the operator quits.
pub async fn run(dashboard: Dashboard, settings: FeedSettings) -> Result<()> {
    let (tx, mut rx) = settings.channel();
    let feeds = FeedHandle::spawn(&settings, tx)?;

    let mut app = AppState::new(dashboard);
    let result = run_terminal(&mut app, &mut rx).await;
    feeds.shutdown();
    result
}

async fn run_terminal(app: &mut AppState, rx: &mut mpsc::Receiver<FeedEvent>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;
    app.update_viewport(size.width, size.height);

    let result = run_loop(&mut terminal, app, rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    rx: &mut mpsc::Receiver<FeedEvent>,
) -> Result<()> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|frame| {
            app.update_viewport(frame.size().width, frame.size().height);
            view::render(frame, app);
        })?;

        tokio::select! {
            Some(event) = rx.recv() => {
                app.apply_feed(event);
                while let Ok(event) = rx.try_recv() {
                    app.apply_feed(event);
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if handle_key(app, key) {
                            break;
                        }
                    }
                    Some(Ok(Event::Resize(width, height))) => app.update_viewport(width, height),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

/// Returns true when the dashboard should exit.
fn handle_key(app: &mut AppState, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if app.search_active {
        let mut query = app.dashboard.query().to_string();
        match key.code {
            KeyCode::Esc => {
                query.clear();
                app.search_active = false;
            }
            KeyCode::Enter => app.search_active = false,
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(ch) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return false;
                }
                if !ch.is_control() {
                    query.push(ch);
                }
            }
            _ => {}
        }
        app.dashboard.set_query(query);
        app.sync_cursor();
        return false;
    }

    app.clear_messages();
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => {
            if app.dashboard.selection().is_open() {
                app.dashboard.close_selection();
                if app.is_narrow() {
                    app.show_detail = false;
                }
            } else if !app.dashboard.query().is_empty() {
                app.dashboard.set_query("");
                app.sync_cursor();
            }
        }
        KeyCode::Char(ch @ '1'..='7') => {
            app.set_tab(ch as usize - '1' as usize);
        }
        KeyCode::Tab => app.cycle_tab(1),
        KeyCode::BackTab => app.cycle_tab(-1),
        KeyCode::Char('/') => app.search_active = true,
        KeyCode::Char('j') | KeyCode::Down => app.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_cursor(-1),
        KeyCode::Char('g') | KeyCode::Home => app.move_cursor(isize::MIN / 2),
        KeyCode::Char('G') | KeyCode::End => app.move_cursor(isize::MAX / 2),
        KeyCode::Enter => app.select_cursor(),
        KeyCode::Char('h') => app.toggle_mode(),
        KeyCode::Char('n') => app.trigger(Intent::RunNow),
        KeyCode::Char('p') => app.trigger(Intent::Pause),
        KeyCode::Char('r') => app.trigger(Intent::Retry),
        KeyCode::Char('x') => app.trigger(Intent::Cancel),
        _ => {}
    }
    false
}
