use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, EditorState, OverlayState, Row, ViewMode};
use crate::hierarchy::ROOT_NAME;
use crate::highlight::build_filter_regex;

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(vertical[0]);

    let filter_regex = if state.mode == ViewMode::Tree {
        build_filter_regex(&state.filter.query)
    } else {
        None
    };
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut items = Vec::with_capacity(state.rows.len());
    for row in &state.rows {
        items.push(render_row(
            row,
            state.preview_lines,
            filter_regex.as_ref(),
            highlight_style,
        ));
    }
    if items.is_empty() {
        items.push(ListItem::new(empty_state_line(state)));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title(pane_title(state))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, columns[0], list_state);

    render_preview(frame, state, columns[1]);

    let status = build_status_block(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);

    render_overlay(frame, state);
}

fn pane_title(state: &AppState) -> String {
    match state.mode {
        ViewMode::Browse => {
            let trail = state.nav.trail();
            if trail.is_empty() {
                ROOT_NAME.to_string()
            } else {
                let crumbs = trail
                    .iter()
                    .enumerate()
                    .map(|(idx, crumb)| format!("{}:{}", idx + 1, crumb.label))
                    .collect::<Vec<_>>()
                    .join(" / ");
                format!("{ROOT_NAME} / {crumbs}")
            }
        }
        ViewMode::Tree => {
            if state.filter.query.is_empty() && !state.filter.active {
                "Tree".to_string()
            } else {
                let cursor = if state.filter.active { "▌" } else { "" };
                format!("Tree ⌕ {}{cursor}", state.filter.query)
            }
        }
    }
}

fn empty_state_line(state: &AppState) -> Line<'static> {
    let message = match state.mode {
        ViewMode::Browse if state.nav.current().is_root() && state.records.is_empty() => {
            "No notes yet. Press `a` to create one.".to_string()
        }
        ViewMode::Browse => format!(
            "Folder {} is empty. Press `a` to add a note here.",
            state.nav.current()
        ),
        ViewMode::Tree if !state.filter.query.is_empty() => {
            format!("No titles match '{}'.", state.filter.query)
        }
        ViewMode::Tree => "No notes yet. Press `a` to create one.".to_string(),
    };
    Line::from(Span::styled(message, Style::default().fg(Color::DarkGray)))
}

fn render_row(
    row: &Row,
    preview_lines: u16,
    filter_regex: Option<&Regex>,
    highlight_style: Style,
) -> ListItem<'static> {
    match row {
        Row::Folder {
            name,
            depth,
            collapsed,
            note_count,
            ..
        } => {
            let marker = if *collapsed { "▸" } else { "▾" };
            let mut spans = vec![Span::raw("  ".repeat(*depth))];
            spans.push(Span::styled(
                format!("{marker} {name}/"),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(" ({note_count})"),
                Style::default().fg(Color::DarkGray),
            ));
            ListItem::new(Line::from(spans))
        }
        Row::Note { note, depth } => {
            let mut spans = vec![Span::raw("  ".repeat(*depth))];
            spans.extend(highlight_line(
                &note.title,
                filter_regex,
                highlight_style,
                Style::default(),
            ));
            spans.push(Span::styled(
                format!("  {}", format_epoch_short(note.updated_at)),
                Style::default().fg(Color::DarkGray),
            ));
            let mut lines = vec![Line::from(spans)];
            if let Some(snippet) = content_snippet(&note.content, preview_lines) {
                lines.push(Line::from(Span::styled(
                    format!("{}  {snippet}", "  ".repeat(*depth)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            ListItem::new(lines)
        }
    }
}

/// Single dim line summarizing up to `max_lines` non-empty content lines.
fn content_snippet(content: &str, max_lines: u16) -> Option<String> {
    if max_lines == 0 {
        return None;
    }
    let mut segments = Vec::new();
    for line in content.lines().take(max_lines as usize) {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed);
        }
    }
    if segments.is_empty() {
        return None;
    }
    let snippet = segments.join(" ");
    Some(snippet.chars().take(120).collect())
}

fn render_preview(frame: &mut Frame, state: &AppState, area: Rect) {
    let editing = state.editor().is_some();
    let text: Text = match (state.editor(), state.selected_note()) {
        (Some(editor), _) => editor_text(editor),
        (None, Some(note)) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    note.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("{}  ·  updated {}", note.folder, format_epoch_short(note.updated_at)),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
            ];
            if note.content.is_empty() {
                lines.push(Line::from(Span::styled(
                    "(empty — press Enter to start writing)",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                lines.extend(note.content.lines().map(|line| Line::from(line.to_string())));
            }
            Text::from(lines)
        }
        (None, None) => Text::from("Select a note to see its contents."),
    };

    let title = if editing {
        let dirty = state.editor().map(EditorState::is_dirty).unwrap_or(false);
        if dirty {
            "Editor *"
        } else {
            "Editor"
        }
    } else {
        "Preview"
    };
    let border = if editing {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(text)
        .block(Block::default().title(title).borders(Borders::ALL).border_style(border))
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);

    if let Some(editor) = state.editor() {
        if let Some((x, y)) = editor_cursor_position(editor, area) {
            frame.set_cursor(x, y);
        }
    }
}

fn editor_text(editor: &EditorState) -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(
            editor.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    if editor.buffer().is_empty() {
        lines.push(Line::from(""));
    } else {
        lines.extend(editor.buffer().lines().map(|line| Line::from(line.to_string())));
        if editor.buffer().ends_with('\n') {
            lines.push(Line::from(""));
        }
    }
    Text::from(lines)
}

// Title plus a blank line precede the buffer in the editor pane.
const EDITOR_BODY_OFFSET: u16 = 2;

fn editor_cursor_position(editor: &EditorState, area: Rect) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }

    let width_limit = inner_width as usize;
    let mut row = EDITOR_BODY_OFFSET;
    let mut col = 0usize;
    let buffer = editor.buffer();
    let cursor = editor.cursor().min(buffer.len());

    for grapheme in buffer[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if glyph_width > 0 && col + glyph_width > width_limit {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }

    let row = row.min(inner_height.saturating_sub(1));
    let col = col.min(width_limit.saturating_sub(1)) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn build_status_block(state: &AppState) -> Text<'static> {
    let mode = match state.mode {
        ViewMode::Browse => "Browse",
        ViewMode::Tree => "Tree",
    };
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, state.rows.len())
    };

    let mut spans = vec![
        Span::raw(format!("Mode: {mode}")),
        Span::raw(" | Path: "),
        Span::styled(
            state.nav.current().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Row: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | Notes: {}", state.records.len())),
    ];

    if state.is_editing() {
        let label = if state.editor().map(EditorState::is_dirty).unwrap_or(false) {
            "EDIT*"
        } else {
            "EDIT"
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            label,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
    }

    if let Some(notice) = state.notice() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    lines.push(Line::from(vec![
        Span::styled(
            "Keys: ",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "j/k move • Enter open • Backspace up • 1-9 crumb • g root • a add",
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    lines.push(Line::from(Span::styled(
        "      r rename • d delete • t tree • Space fold • / filter • Ctrl-r reload • q quit",
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn format_epoch_short(epoch: i64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp(epoch)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| epoch.to_string())
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for mat in re.find_iter(text) {
        if mat.start() > last {
            spans.push(Span::styled(text[last..mat.start()].to_string(), base_style));
        }
        spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
        last = mat.end();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::NewNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut title_display = draft.title.clone();
            title_display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("New note in {}", draft.folder),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(title_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter create • Esc cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("New Note")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::RenameNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut title_display = draft.title.clone();
            title_display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Rename note",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(title_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter save • Esc cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Rename")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::DeleteNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete note",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!("Permanently delete '{}'?", draft.title)),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter confirm • Esc cancel",
                    Style::default().fg(Color::Red),
                )),
            ])
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
