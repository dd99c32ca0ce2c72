use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::dashboard::ConnectionState;
use crate::projection::Tab;
use crate::selection::Intent;
use crate::task::{format_timestamp, TaskSnapshot, TaskStatus};

use super::app::{AppState, StatusKind};

const STATUS_WIDTH: usize = 7;
const ID_WIDTH: usize = 14;
const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_MUTED_DARK: Color = Color::Rgb(118, 124, 130);
const COLOR_BG_MUTED: Color = Color::Rgb(52, 56, 60);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_SUCCESS: Color = Color::Rgb(126, 210, 146);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER_LIST: Color = Color::Rgb(92, 126, 166);
const COLOR_BORDER_DETAIL: Color = Color::Rgb(180, 156, 92);
const COLOR_MAGENTA: Color = Color::Rgb(214, 140, 230);

pub fn render(frame: &mut Frame, app: &AppState) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);
    let tabs = chunks[0];
    let main = chunks[1];
    let footer = chunks[2];

    render_tabs(frame, app, tabs);

    if app.is_narrow() && !app.show_detail {
        render_list(frame, app, main);
    } else if app.is_narrow() {
        render_detail(frame, app, main);
    } else {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
            .split(main);
        render_list(frame, app, chunks[0]);
        render_detail(frame, app, chunks[1]);
    }

    render_footer(frame, app, footer);
}

fn render_tabs(frame: &mut Frame, app: &AppState, area: Rect) {
    let counts = app.dashboard.status_counts();
    let active = app.tab_index();

    let mut spans = Vec::new();
    for (idx, tab) in app.tabs.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled("  ", Style::default().fg(COLOR_MUTED_DARK)));
        }
        let count = match tab {
            Tab::All => counts.total,
            Tab::Status(status) => counts.get(status),
        };
        let text = format!("{} {} ({count})", idx + 1, tab_label(tab));
        let style = if idx == active {
            Style::default()
                .fg(tab_color(tab))
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(COLOR_MUTED)
        };
        spans.push(Span::styled(text, style));
    }

    let widget = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(COLOR_BG_MUTED)),
    );
    frame.render_widget(widget, area);
}

fn render_list(frame: &mut Frame, app: &AppState, area: Rect) {
    let mut lines = Vec::new();
    let content_width = area.width.saturating_sub(2) as usize;

    if app.search_active || !app.dashboard.query().is_empty() {
        let search_label = if app.search_active && app.dashboard.query().is_empty() {
            "search: _".to_string()
        } else {
            format!("search: {}", app.dashboard.query())
        };
        lines.push(Line::from(vec![
            Span::styled(search_label, Style::default().fg(COLOR_INFO)),
            Span::raw("  "),
            Span::styled(
                format!("tab: {}", app.dashboard.tab()),
                Style::default().fg(COLOR_WARNING),
            ),
        ]));
        lines.push(Line::from(""));
    }

    let visible = app.visible();
    if visible.is_empty() {
        if !app.dashboard.filter().is_identity() {
            lines.push(Line::from("No matches"));
        } else if app.dashboard.connection() == ConnectionState::Connecting {
            lines.push(Line::from("Waiting for the task feed..."));
        } else {
            lines.push(Line::from("No tasks"));
        }
    } else {
        let list_height = area
            .height
            .saturating_sub(2)
            .saturating_sub(lines.len() as u16) as usize;
        let cursor = app.cursor();
        let selected_id = app.dashboard.selection().id();
        let (start, end) = list_window(visible.len(), cursor, list_height);
        for (pos, task) in visible.iter().enumerate().take(end).skip(start) {
            lines.push(render_list_row(
                task,
                cursor == Some(pos),
                selected_id == Some(task.id.as_str()),
                content_width,
            ));
        }
    }

    let title = format!("{} ({})", app.list_title(), visible.len());
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(COLOR_BORDER_LIST)),
    );
    frame.render_widget(widget, area);
}

fn render_detail(frame: &mut Frame, app: &AppState, area: Rect) {
    let content_width = area.width.saturating_sub(2) as usize;
    let widget = Paragraph::new(build_detail_lines(app, content_width))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Details")
                .border_style(Style::default().fg(COLOR_BORDER_DETAIL)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn render_footer(frame: &mut Frame, app: &AppState, area: Rect) {
    let hint = app.footer_hint();
    let hint_span = Span::styled(hint, Style::default().fg(COLOR_INFO));
    let line = if let Some((status, kind)) = app.status_line() {
        let status_style = match kind {
            StatusKind::Error => Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
            StatusKind::Info => Style::default().fg(COLOR_WARNING),
        };
        Line::from(vec![
            hint_span,
            Span::raw("  |  "),
            Span::styled(status, status_style),
        ])
    } else {
        Line::from(hint_span)
    };
    let counts_line = Line::from(Span::styled(
        app.task_count_summary(),
        Style::default().fg(connection_color(app.dashboard.connection())),
    ));
    let widget = Paragraph::new(vec![line, counts_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(COLOR_BORDER_LIST)),
        );
    frame.render_widget(widget, area);
}

fn render_list_row(
    task: &TaskSnapshot,
    under_cursor: bool,
    selected: bool,
    width: usize,
) -> Line<'static> {
    let status_text = pad_text_center(&status_badge(&task.status), STATUS_WIDTH);
    let id_text = pad_text(&task.id, ID_WIDTH);
    let marker = if selected { ">" } else { " " };
    let used = 1 + STATUS_WIDTH + 1 + ID_WIDTH + 1;
    let name = truncate_text(&task.name, width.saturating_sub(used));

    let mut spans = vec![
        Span::styled(marker, Style::default().fg(COLOR_ACCENT)),
        Span::styled(
            status_text,
            status_style(&task.status).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(id_text, id_style()),
        Span::raw(" "),
        Span::styled(name, Style::default().fg(COLOR_TEXT)),
    ];

    if under_cursor {
        for span in &mut spans {
            span.style = span.style.add_modifier(Modifier::REVERSED);
        }
    }

    Line::from(spans)
}

fn build_detail_lines(app: &AppState, width: usize) -> Vec<Line<'static>> {
    let Some(task) = app.dashboard.selected() else {
        return vec![
            Line::from("No task selected"),
            Line::from(Span::styled(
                "enter on a row to inspect it",
                Style::default().fg(COLOR_MUTED_DARK),
            )),
        ];
    };

    let mut lines = vec![
        Line::from(vec![
            label_span("ID      "),
            Span::styled(task.id.clone(), id_style()),
        ]),
        Line::from(vec![
            label_span("Name    "),
            Span::styled(task.name.clone(), Style::default().fg(COLOR_TEXT)),
        ]),
        Line::from(vec![
            label_span("Status  "),
            Span::styled(
                format!(" {} ", task.status),
                status_style(&task.status).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label_span("Created "),
            Span::styled(
                task.created_at
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string()),
                Style::default().fg(COLOR_TEXT),
            ),
        ]),
    ];
    if let Some(version) = task.version {
        lines.push(Line::from(vec![
            label_span("Version "),
            Span::styled(version.to_string(), Style::default().fg(COLOR_TEXT)),
        ]));
    }
    if !app.dashboard.store().contains(&task.id) {
        lines.push(Line::from(Span::styled(
            "from history; not on the live feed",
            Style::default().fg(COLOR_MUTED_DARK),
        )));
    }

    lines.push(Line::from(""));
    lines.push(section_header("Payload"));
    if task.payload.is_empty() {
        lines.push(Line::from(Span::styled(
            "{}",
            Style::default().fg(COLOR_MUTED),
        )));
    } else {
        for raw in task.payload.to_pretty().lines() {
            lines.push(Line::from(Span::styled(
                truncate_text(raw, width),
                Style::default().fg(COLOR_TEXT),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(section_header("Actions"));
    for intent in Intent::available(&task.status) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", intent.key()),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(intent.label().to_string(), Style::default().fg(COLOR_TEXT)),
        ]));
    }

    lines
}

fn list_window(total: usize, selected: Option<usize>, height: usize) -> (usize, usize) {
    if total == 0 || height == 0 {
        return (0, 0);
    }
    if total <= height {
        return (0, total);
    }
    let selected = selected.unwrap_or(0);
    let mut start = selected.saturating_sub(height / 2);
    if start + height > total {
        start = total - height;
    }
    (start, start + height)
}

fn tab_label(tab: &Tab) -> String {
    match tab {
        Tab::All => "All".to_string(),
        Tab::Status(status) => {
            let name = status.as_str();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn tab_color(tab: &Tab) -> Color {
    match tab {
        Tab::All => COLOR_INFO,
        Tab::Status(status) => status_colors(status).0,
    }
}

fn status_badge(status: &TaskStatus) -> String {
    match status {
        TaskStatus::Pending => "PEND".to_string(),
        TaskStatus::Processing => "PROG".to_string(),
        TaskStatus::Completed => "DONE".to_string(),
        TaskStatus::Failed => "FAIL".to_string(),
        TaskStatus::Retrying => "RETRY".to_string(),
        TaskStatus::Scheduled => "SCHED".to_string(),
        TaskStatus::Unknown(raw) => truncate_text(&raw.to_ascii_uppercase(), 6),
    }
}

fn status_style(status: &TaskStatus) -> Style {
    let (fg, bg) = status_colors(status);
    Style::default().fg(fg).bg(bg)
}

fn status_colors(status: &TaskStatus) -> (Color, Color) {
    match status {
        TaskStatus::Pending => (COLOR_WARNING, Color::Rgb(61, 52, 26)),
        TaskStatus::Processing => (Color::Rgb(139, 233, 253), Color::Rgb(26, 51, 68)),
        TaskStatus::Completed => (Color::Rgb(80, 250, 123), Color::Rgb(26, 61, 42)),
        TaskStatus::Failed => (COLOR_ERROR, Color::Rgb(68, 26, 26)),
        TaskStatus::Retrying => (Color::Rgb(255, 147, 112), Color::Rgb(61, 40, 26)),
        TaskStatus::Scheduled => (COLOR_MAGENTA, Color::Rgb(50, 30, 61)),
        TaskStatus::Unknown(_) => (COLOR_TEXT, COLOR_BG_MUTED),
    }
}

fn connection_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connecting => COLOR_WARNING,
        ConnectionState::Connected => COLOR_SUCCESS,
        ConnectionState::Disconnected => COLOR_ERROR,
    }
}

fn pad_text(value: &str, width: usize) -> String {
    let text = truncate_text(value, width);
    format!("{text:width$}")
}

fn pad_text_center(value: &str, width: usize) -> String {
    let text = truncate_text(value, width);
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let total_pad = width - len;
    let left = total_pad / 2;
    let right = total_pad - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

fn truncate_text(value: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max {
        return value.to_string();
    }
    if max <= 3 {
        return chars[..max].iter().collect();
    }
    let mut out: String = chars[..(max - 3)].iter().collect();
    out.push_str("...");
    out
}

fn label_span(label: &str) -> Span<'static> {
    Span::styled(label.to_string(), Style::default().fg(COLOR_MUTED_DARK))
}

fn section_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(COLOR_MAGENTA)
            .add_modifier(Modifier::BOLD),
    ))
}

fn id_style() -> Style {
    Style::default()
        .fg(COLOR_MUTED)
        .add_modifier(Modifier::BOLD)
}
