use covert_console_core::{FieldKind, LogEntry};
use covert_console_session::{ConsoleSession, SessionPhase};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::{App, Focus, Row, field_at, is_multiline};

/// Text lines shown while editing key material.
const KEY_LINES: u16 = 8;

pub fn render(frame: &mut Frame, app: &App, session: &ConsoleSession, engine_url: &str) {
    let input = input_height(app);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),     // Status
            Constraint::Min(6),        // Form and logs
            Constraint::Length(input), // Input
            Constraint::Length(1),     // Help
        ])
        .split(frame.area());

    render_status(frame, chunks[0], session, engine_url);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    render_form(frame, body[0], app, session);

    let logs = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body[1]);
    let system = session.log().system_entries();
    let covert = session.log().covert_entries();
    render_log(frame, logs[0], "System", &system);
    render_log(frame, logs[1], "Covert messages", &covert);

    render_input(frame, chunks[2], app);
    render_help(frame, chunks[3], app);
}

fn render_status(frame: &mut Frame, area: Rect, session: &ConsoleSession, engine_url: &str) {
    let (label, color) = match session.phase() {
        SessionPhase::Disconnected => ("Disconnected", Color::Red),
        SessionPhase::AwaitingCatalog => ("Loading...", Color::Yellow),
        SessionPhase::Idle => ("Channel closed", Color::Cyan),
        SessionPhase::ChannelOpen => ("Channel open", Color::Green),
    };
    let bold = Style::default().fg(color).add_modifier(Modifier::BOLD);
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(label, bold),
        Span::raw(" | "),
        Span::raw(engine_url),
    ]));
    frame.render_widget(status, area);
}

fn row_line(row: &Row, session: &ConsoleSession) -> Line<'static> {
    let store = session.store();
    match row {
        Row::ChannelType => {
            let name = store.channel_type().unwrap_or("<none>");
            Line::from(vec![
                Span::styled("Channel: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(name.to_string()),
            ])
        }
        Row::Processor(i) => {
            let name = store
                .pipeline()
                .get(*i)
                .and_then(|entry| entry.kind.clone())
                .unwrap_or_else(|| "<none>".to_string());
            Line::from(vec![
                Span::styled(
                    format!("Processor #{}: ", i + 1),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(name),
            ])
        }
        Row::ChannelField(key) | Row::ProcessorField(_, key) => {
            let indent = if matches!(row, Row::ChannelField(_)) { "  " } else { "    " };
            let Some(field) = field_at(session, row) else {
                return Line::from(format!("{indent}{key}"));
            };
            let value = match field.kind() {
                FieldKind::OpaqueKey => "*".repeat(field.display_text().len()),
                _ => field.display_text(),
            };
            let value_style = if field.validate().is_ok() {
                Style::default()
            } else {
                Style::default().fg(Color::Red)
            };
            Line::from(vec![
                Span::raw(format!("{indent}{}: ", field.display.label(key))),
                Span::styled(value, value_style),
            ])
        }
    }
}

fn render_form(frame: &mut Frame, area: Rect, app: &App, session: &ConsoleSession) {
    let rows = App::rows(session);
    let visible = usize::from(area.height.saturating_sub(2));
    let offset = app.selected.saturating_sub(visible.saturating_sub(1));

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .map(|(i, row)| {
            let line = row_line(row, session);
            if i == app.selected {
                line.style(Style::default().bg(Color::DarkGray))
            } else {
                line
            }
        })
        .collect();

    let title = if session.is_loading() {
        "Configuration (loading)"
    } else {
        "Configuration"
    };
    let form = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(form, area);
}

fn log_style(text: &str) -> Style {
    if text.starts_with("[ERROR]") || text.starts_with("[TRANSPORT]") {
        Style::default().fg(Color::Red)
    } else if text.starts_with("[WARNING]") {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_log(frame: &mut Frame, area: Rect, title: &str, entries: &[LogEntry]) {
    let visible = usize::from(area.height.saturating_sub(2));
    let lines: Vec<Line> = entries
        .iter()
        .skip(entries.len().saturating_sub(visible))
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", entry.timestamp()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(entry.text.clone(), log_style(&entry.text)),
            ])
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title(title);
    let log = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(log, area);
}

fn input_height(app: &App) -> u16 {
    match &app.focus {
        Focus::Field { editor, .. } if is_multiline(editor) => KEY_LINES + 2,
        _ => 3,
    }
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let (title, text, style) = match &app.focus {
        Focus::Form => ("Input".to_string(), String::new(), Style::default()),
        Focus::Compose(text) => (
            "Covert message".to_string(),
            text.clone(),
            Style::default().fg(Color::Yellow),
        ),
        Focus::Field { editor, .. } => {
            let title = editor
                .error_hint()
                .unwrap_or_else(|| format!("Editing ({})", editor.field().kind()));
            let style = if editor.error_hint().is_some() {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Yellow)
            };
            (title, editor.text().to_string(), style)
        }
    };

    // Keep the last line in view; the cursor sits at its end.
    let inner = area.height.saturating_sub(2).max(1);
    let lines = u16::try_from(text.split('\n').count()).unwrap_or(u16::MAX);
    let scroll = lines.saturating_sub(inner);
    if !matches!(app.focus, Focus::Form) {
        let last = text.rsplit('\n').next().unwrap_or_default();
        let column = u16::try_from(last.chars().count()).unwrap_or(u16::MAX);
        let row = lines.saturating_sub(1).saturating_sub(scroll);
        frame.set_cursor_position((
            area.x.saturating_add(column).saturating_add(1),
            area.y.saturating_add(row).saturating_add(1),
        ));
    }

    let input = Paragraph::new(text)
        .scroll((scroll, 0))
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(input, area);
}

fn render_help(frame: &mut Frame, area: Rect, app: &App) {
    let text = match &app.focus {
        Focus::Form => {
            " j/k:Move  Enter:Edit  c:Channel  a/p/d:Add/Type/Delete processor  J/K:Reorder  o/x:Open/Close  m:Message  s/l:Save/Load  q:Quit"
        }
        Focus::Field { editor, .. } if is_multiline(editor) => {
            " Enter:Newline  Tab/Ctrl+S:Apply  Esc:Cancel  Ctrl+C:Quit"
        }
        Focus::Field { .. } => " Enter:Apply  Esc:Cancel  Ctrl+C:Quit",
        Focus::Compose(_) => " Enter:Send  Esc:Cancel  Ctrl+C:Quit",
    };
    let help = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
