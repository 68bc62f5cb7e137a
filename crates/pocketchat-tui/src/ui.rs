use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use pocketchat_core::{ChatMessage, ChatRole, ModelStatus};
use crate::app::App;

/// Width of the drawer handle column.
const TOGGLE_WIDTH: u16 = 3;

/// Parse inline `**bold**` and `` `code` `` spans; anything unmatched stays
/// literal.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
                } else {
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                    if found_close {
                        current_text.push_str("**");
                    }
                }
            }
            '`' => {
                let mut code = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code.push(c);
                }

                if found_close {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code, Style::default().fg(Color::Magenta)));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code);
                }
            }
            _ => current_text.push(c),
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Split spans into words, each ending after a space. A word may cross
/// span boundaries (e.g. `**bold**,`).
fn split_words(spans: Vec<Span<'static>>) -> Vec<Vec<Span<'static>>> {
    let mut words = Vec::new();
    let mut word = Vec::new();
    for span in spans {
        for piece in span.content.split_inclusive(' ') {
            word.push(Span::styled(piece.to_string(), span.style));
            if piece.ends_with(' ') {
                words.push(std::mem::take(&mut word));
            }
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

/// Word-wrap a styled line into rows of at most `width` columns, keeping
/// span styles. Words longer than a row are split.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let (style, alignment) = (line.style, line.alignment);
    let mut rows: Vec<Vec<Span<'static>>> = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut row_len = 0;

    for word in split_words(line.spans) {
        let len: usize = word.iter().map(|s| s.content.chars().count()).sum();
        let trailing = word.last().is_some_and(|s| s.content.ends_with(' '));
        let visible = len - usize::from(trailing);

        if row_len > 0 && row_len + visible > width {
            rows.push(std::mem::take(&mut row));
            row_len = 0;
        }
        if visible <= width {
            row_len += len;
            row.extend(word);
            continue;
        }

        for span in word {
            let mut chunk = String::new();
            for ch in span.content.chars() {
                if row_len >= width {
                    if ch == ' ' {
                        continue;
                    }
                    if !chunk.is_empty() {
                        row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                    }
                    rows.push(std::mem::take(&mut row));
                    row_len = 0;
                }
                chunk.push(ch);
                row_len += 1;
            }
            if !chunk.is_empty() {
                row.push(Span::styled(chunk, span.style));
            }
        }
    }
    rows.push(row);

    rows.into_iter()
        .map(|spans| {
            let mut row = Line::from(spans).style(style);
            row.alignment = alignment;
            row
        })
        .collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let drawer_width = if app.chat.is_drawer_open() {
        Constraint::Percentage(45)
    } else {
        Constraint::Length(0)
    };
    let [main_area, toggle_area, drawer_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(TOGGLE_WIDTH),
        drawer_width,
    ])
    .areas(body_area);

    render_status(app, frame, main_area);
    render_toggle(app, frame, toggle_area);
    if app.chat.is_drawer_open() {
        render_drawer(app, frame, drawer_area);
    } else {
        app.chat_area = None;
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" pocketchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.model.clone(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: &[(&str, &str)] = if app.chat.is_drawer_open() {
        &[
            ("Enter", "send"),
            ("Alt+Enter", "newline"),
            ("Ctrl+T", "thoughts"),
            ("PgUp/PgDn", "scroll"),
            ("Esc", "close"),
            ("Ctrl+C", "quit"),
        ]
    } else {
        &[("Ctrl+B", "open chat"), ("q", "quit")]
    };

    let mode_style = if app.chat.is_generating() {
        Style::default().bg(Color::Yellow).fg(Color::Black)
    } else {
        Style::default().bg(Color::Blue).fg(Color::White)
    };
    let mode_text = if app.chat.is_generating() { " GENERATING " } else { " CHAT " };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [_, text_area, gauge_area, _] = Layout::vertical([
        Constraint::Percentage(35),
        Constraint::Length(5),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    let status = app.chat.status();
    let status_style = match status {
        ModelStatus::Initializing => Style::default().fg(Color::Yellow),
        ModelStatus::Ready => Style::default().fg(Color::Green).bold(),
        ModelStatus::Error => Style::default().fg(Color::Red).bold(),
    };

    let mut lines = vec![
        Line::from(Span::styled("pocketchat", Style::default().fg(Color::Cyan).bold())),
        Line::from(Span::styled(
            format!("{} @ {}", app.model, app.host),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(status.label(), status_style)),
    ];
    match status {
        ModelStatus::Error => lines.push(Line::from(Span::styled(
            "Make sure Ollama is running: ollama serve",
            Style::default().fg(Color::DarkGray),
        ))),
        _ if !app.worker_alive => lines.push(Line::from(Span::styled(
            "Generation worker stopped; restart to chat again",
            Style::default().fg(Color::Red),
        ))),
        _ if !app.chat.is_drawer_open() => lines.push(Line::from(Span::styled(
            "Press Ctrl+B to open the chat",
            Style::default().fg(Color::DarkGray),
        ))),
        _ => {}
    }

    frame.render_widget(
        Paragraph::new(Text::from(lines)).alignment(Alignment::Center),
        text_area,
    );

    if let Some(progress) = app.chat.progress() {
        let gauge_area = gauge_area.inner(ratatui::layout::Margin::new(4, 0));
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", progress.file)))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio((progress.progress / 100.0).clamp(0.0, 1.0))
            .label(format!("{:.0}%", progress.progress));
        frame.render_widget(gauge, gauge_area);
    }
}

fn render_toggle(app: &mut App, frame: &mut Frame, area: Rect) {
    app.toggle_area = Some(area);
    let arrow = if app.chat.is_drawer_open() { "▶" } else { "◀" };

    let mut lines = vec![Line::default(); (area.height / 2) as usize];
    lines.push(Line::from(Span::styled(
        arrow,
        Style::default().bg(Color::Blue).fg(Color::White).bold(),
    )));

    frame.render_widget(
        Paragraph::new(Text::from(lines)).alignment(Alignment::Center),
        area,
    );
}

fn message_lines(msg: &ChatMessage, app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));

            let thinking = msg.thinking.as_deref().map(str::trim).filter(|t| !t.is_empty());
            if let Some(thinking) = thinking {
                let dim = Style::default().fg(Color::DarkGray);
                if app.show_thinking {
                    lines.push(Line::from(Span::styled("▾ Thought Process", dim.bold())));
                    for line in thinking.lines() {
                        lines.push(Line::from(Span::styled(
                            format!("  {}", line),
                            dim.add_modifier(Modifier::ITALIC),
                        )));
                    }
                } else {
                    lines.push(Line::from(Span::styled("▸ Thought Process (Ctrl+T)", dim.bold())));
                }
            }

            let content = msg.content.trim();
            let waiting = msg.is_awaiting_output()
                || (content.is_empty() && msg.is_thinking(app.chat.markers()));
            if waiting {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            for line in content.lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_drawer(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat (Esc to close) ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input_height = app.input_rows() + 2;
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(input_height),
    ])
    .areas(inner);

    // Store area for mouse hit-testing
    app.chat_area = Some(chat_area);

    // Rows are wrapped up front so the scroll extent matches what is drawn
    let width = chat_area.width as usize;
    let chat_text = if app.chat.messages().is_empty() {
        Text::from(Span::styled(
            "Say hello to start a conversation...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let view: &App = app;
        let lines: Vec<Line> = view
            .chat
            .messages()
            .iter()
            .flat_map(|msg| message_lines(msg, view))
            .flat_map(|line| wrap_line(line, width))
            .collect();
        Text::from(lines)
    };

    let total = u16::try_from(chat_text.lines.len()).unwrap_or(u16::MAX);
    app.set_chat_extent(total, chat_area.height);

    let chat = Paragraph::new(chat_text).scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.chat.is_generating() { Color::DarkGray } else { Color::Yellow };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (line, col) = app.cursor_line_col();

    // Scroll offsets keep the cursor visible
    let scroll_x = if inner_width == 0 || col < inner_width { 0 } else { col - inner_width + 1 };
    let scroll_y = if inner_height == 0 || line < inner_height { 0 } else { line - inner_height + 1 };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled("Type a message...", Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(app.input.as_str())
            .style(Style::default().fg(Color::Cyan))
            .scroll((scroll_y as u16, scroll_x as u16))
    };
    frame.render_widget(input.block(input_block), area);

    let cursor_x = (col - scroll_x) as u16;
    let cursor_y = (line - scroll_y) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + cursor_y + 1));
}
