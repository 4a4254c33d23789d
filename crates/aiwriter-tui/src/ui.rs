use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use aiwriter_core::ChatRole;
use crate::app::{App, FocusPane, Popup};
use crate::settings::FIELDS;

/// Border and highlight colors for the configured theme.
struct Palette {
    accent: Color,
    muted: Color,
}

impl Palette {
    fn for_theme(theme: &str) -> Self {
        match theme {
            "cream-navy" => Palette {
                accent: Color::Blue,
                muted: Color::Gray,
            },
            _ => Palette {
                accent: Color::Magenta,
                muted: Color::DarkGray,
            },
        }
    }

    fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.accent } else { self.muted })
    }
}

/// Rows a line of `chars` characters takes when hard-wrapped at `width`.
fn wrapped_rows(chars: usize, width: usize) -> usize {
    chars.div_ceil(width.max(1)).max(1)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(&app.session.config().theme);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let mut constraints = Vec::new();
    if app.show_file_panel {
        constraints.push(Constraint::Percentage(22));
    }
    constraints.push(Constraint::Min(20));
    if app.show_ai_panel {
        constraints.push(Constraint::Percentage(35));
    }
    let panes = Layout::horizontal(constraints).split(body_area);

    let mut next = 0;
    if app.show_file_panel {
        render_files(app, frame, panes[next], &palette);
        next += 1;
    }
    render_editor(app, frame, panes[next], &palette);
    next += 1;
    if app.show_ai_panel {
        render_chat(app, frame, panes[next], &palette);
    }

    render_footer(app, frame, footer_area);

    match app.popup {
        Popup::None => {}
        Popup::Browser => render_browser(app, frame, area, &palette),
        Popup::SaveAs => render_save_as(app, frame, area, &palette),
        Popup::Scripts => render_scripts(app, frame, area, &palette),
        Popup::ScriptOutput => render_script_output(app, frame, area, &palette),
        Popup::Settings => render_settings(app, frame, area, &palette),
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let folder = app
        .session
        .root()
        .map(|root| root.display().to_string())
        .unwrap_or_else(|| "no folder".to_string());

    let title = Line::from(vec![
        Span::styled(" ai-writer ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(folder, Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(app.session.context().label(), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    if let Some(status) = &app.status {
        let line = Line::from(Span::styled(format!(" {} ", status), Style::default().fg(Color::Yellow)));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let pairs: &[(&str, &str)] = match app.focus {
        FocusPane::Files => &[("j/k", "nav"), ("Enter", "open"), ("Space", "context"), ("r", "refresh")],
        FocusPane::Editor => &[("^S", "save"), ("^N", "new"), ("^W", "close"), ("^←/→", "tabs")],
        FocusPane::Chat => &[("Enter", "send"), ("Esc", "cancel"), ("↑/↓", "scroll")],
    };
    let common: &[(&str, &str)] = &[
        ("Tab", "focus"),
        ("^O", "folder"),
        ("^P", "scripts"),
        ("^X", "clear ctx"),
        ("^E", "settings"),
        ("^R", "reload"),
        ("^Q", "quit"),
    ];

    let spans: Vec<Span> = pairs
        .iter()
        .chain(common)
        .flat_map(|(key, label)| {
            [
                Span::styled(format!(" {} ", key), key_style),
                Span::styled(format!(" {} ", label), label_style),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_files(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border(app.focus == FocusPane::Files))
        .title(format!(" {} ", app.session.context().label()));

    if app.session.root().is_none() {
        let hint = Paragraph::new("Ctrl+O to open a folder")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem> = app
        .visible_rows()
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let marker = if row.node.is_dir {
                if app.expanded.contains(&row.node.path) { "▾ " } else { "▸ " }
            } else if app.session.context().has(&row.node.path) {
                "[x] "
            } else {
                "[ ] "
            };
            let style = if row.node.is_dir {
                Style::default().fg(palette.accent)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}{}", indent, marker, row.node.name)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, area, &mut app.tree_state);
}

fn render_editor(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let [tabs_area, edit_area] = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    let active = app.session.tabs().active_index();
    let mut tab_spans = Vec::new();
    for (i, tab) in app.session.tabs().iter().enumerate() {
        let style = if Some(i) == active {
            Style::default().fg(Color::Black).bg(palette.accent).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        tab_spans.push(Span::styled(format!(" {} ", tab.label()), style));
        tab_spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(tab_spans)), tabs_area);

    let focused = app.focus == FocusPane::Editor;
    let title = app
        .session
        .tabs()
        .active()
        .map(|tab| format!(" {} ", tab.path().unwrap_or(tab.name())))
        .unwrap_or_default();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border(focused))
        .title(title);
    let inner = block.inner(edit_area);
    frame.render_widget(block, edit_area);

    app.editor_height = inner.height;
    let show_numbers = app.session.config().show_line_numbers;
    let wrap = app.session.config().wrap_text;

    let Some(tab) = app.session.tabs_mut().active_mut() else {
        return;
    };
    let buffer = &mut tab.buffer;
    let height = inner.height as usize;
    if height == 0 {
        return;
    }

    let gutter = if show_numbers {
        buffer.lines().len().to_string().len() as u16 + 1
    } else {
        0
    };
    let width = inner.width.saturating_sub(gutter).max(1) as usize;
    let (cur_row, cur_col) = buffer.cursor();

    buffer.scroll_to_cursor(height);
    if wrap {
        // Pull the first line forward until the cursor's wrapped row is on screen
        loop {
            let rows_before: usize = buffer.lines()[buffer.scroll..cur_row]
                .iter()
                .map(|l| wrapped_rows(l.chars().count(), width))
                .sum::<usize>()
                + cur_col / width;
            if rows_before < height || buffer.scroll >= cur_row {
                break;
            }
            buffer.scroll += 1;
        }
    }
    let h_offset = if wrap { 0 } else { cur_col.saturating_sub(width - 1) };

    let number_style = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();
    let mut cursor_pos = None;
    for (row, text) in buffer.lines().iter().enumerate().skip(buffer.scroll) {
        if lines.len() >= height {
            break;
        }
        let chars: Vec<char> = text.chars().collect();
        let chunks: Vec<String> = if wrap {
            if chars.is_empty() {
                vec![String::new()]
            } else {
                chars.chunks(width).map(|c| c.iter().collect()).collect()
            }
        } else {
            vec![chars.iter().skip(h_offset).take(width).collect()]
        };

        if row == cur_row {
            let (dy, dx) = if wrap {
                (cur_col / width, cur_col % width)
            } else {
                (0, cur_col - h_offset)
            };
            cursor_pos = Some((lines.len() + dy, dx));
        }

        for (i, chunk) in chunks.into_iter().enumerate() {
            let number = if !show_numbers {
                String::new()
            } else if i == 0 {
                format!("{:>w$} ", row + 1, w = gutter as usize - 1)
            } else {
                " ".repeat(gutter as usize)
            };
            lines.push(Line::from(vec![Span::styled(number, number_style), Span::raw(chunk)]));
        }
    }

    frame.render_widget(Paragraph::new(lines), inner);

    if focused && app.popup == Popup::None {
        if let Some((y, x)) = cursor_pos.filter(|(y, _)| *y < height) {
            frame.set_cursor_position((inner.x + gutter + x as u16, inner.y + y as u16));
        }
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let [chat_area, input_area] = Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);
    let focused = app.focus == FocusPane::Chat;

    let title = match &app.model_name {
        Some(model) => format!(" AI: {} ", model),
        None => " AI ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border(focused))
        .title(title);
    let inner = block.inner(chat_area);

    let history = app.session.chat().history();
    let text = if history.is_empty() {
        Text::from(Span::styled(
            "Ask about your files. Check files in the panel to add them as context.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for message in history {
            let color = match message.role {
                ChatRole::User => Color::Cyan,
                ChatRole::Ai => Color::Green,
                ChatRole::System => Color::DarkGray,
                ChatRole::Error => Color::Red,
            };
            lines.push(Line::from(Span::styled(
                format!("{}:", message.role.label()),
                Style::default().fg(color).bold(),
            )));
            for line in message.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    let width = inner.width as usize;
    let total: usize = text
        .lines
        .iter()
        .map(|l| wrapped_rows(l.width(), width))
        .sum();
    let max_scroll = total.saturating_sub(inner.height as usize).min(u16::MAX as usize) as u16;
    app.chat_scroll = app.chat_scroll.min(max_scroll);

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let pending = app.session.chat().is_pending();
    let mentions = app.session.mentions(&app.chat_input);
    let input_title = if pending {
        format!(" Waiting{} (Esc to cancel) ", ".".repeat(app.animation_frame as usize + 1))
    } else if !mentions.is_empty() {
        let names: Vec<String> = mentions
            .iter()
            .map(|m| if m.path.is_some() { format!("@{}", m.name) } else { format!("@{}?", m.name) })
            .collect();
        format!(" {} ", names.join(" "))
    } else {
        " Message ".to_string()
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border(focused))
        .title(input_title);
    let input_inner = input_block.inner(input_area);

    let visible = input_inner.width.saturating_sub(1) as usize;
    let skip = app.chat_cursor.saturating_sub(visible);
    let shown: String = app.chat_input.chars().skip(skip).collect();
    frame.render_widget(Paragraph::new(shown).block(input_block), input_area);

    if focused && app.popup == Popup::None {
        let x = (app.chat_cursor - skip) as u16;
        frame.set_cursor_position((input_inner.x + x, input_inner.y));
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_browser(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some(browser) = app.browser.as_ref() else {
        return;
    };
    let state = browser.state();

    let popup_area = centered(area, 70, 20);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Open Folder (l enter, h up, Enter choose, Esc cancel) ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [path_area, list_area] = Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(inner);

    let mut header = vec![Line::from(Span::styled(
        state.current_path().to_string(),
        Style::default().fg(Color::Cyan).bold(),
    ))];
    if let Some(error) = state.error() {
        header.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
    } else if !state.can_go_up() {
        header.push(Line::from(Span::styled("(top level)", Style::default().fg(Color::DarkGray))));
    }
    frame.render_widget(Paragraph::new(header), path_area);

    let items: Vec<ListItem> = state
        .entries()
        .iter()
        .map(|entry| ListItem::new(format!(" {}/ ", entry.name)))
        .collect();
    let list = List::new(items)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.browser_state);
}

fn render_save_as(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let popup_area = centered(area, 70, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Save As (Enter to save, Esc to cancel) ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if app.save_as_confirm.is_some() {
        let warning = Line::from(Span::styled(
            "File exists. Enter again to overwrite.",
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(Paragraph::new(warning), Rect::new(inner.x, inner.y, inner.width, 1));
    }

    let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
    let len = app.save_as_input.chars().count();
    let visible = inner.width.saturating_sub(1) as usize;
    let shown: String = app.save_as_input.chars().skip(len.saturating_sub(visible)).collect();
    let cursor_x = shown.chars().count() as u16;
    frame.render_widget(Paragraph::new(shown).style(Style::default().fg(Color::Cyan)), input_area);
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_settings(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some(form) = app.settings.as_ref() else {
        return;
    };
    let popup_area = centered(area, 76, FIELDS.len() as u16 + 4);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Settings (↑/↓ field, Space/←/→ change, Enter save, Esc cancel) ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    const LABEL_WIDTH: usize = 16;
    let value_width = (inner.width as usize).saturating_sub(LABEL_WIDTH + 3).max(1);
    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;
    for (i, field) in FIELDS.iter().enumerate() {
        let value = form.value(*field);
        let selected = i == form.selected;
        let shown: String = if selected && !field.is_choice() {
            let skip = form.cursor.saturating_sub(value_width - 1);
            cursor = Some((i, form.cursor - skip));
            value.chars().skip(skip).take(value_width).collect()
        } else {
            value.chars().take(value_width).collect()
        };
        let label_style = if selected {
            Style::default().fg(palette.accent).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if selected { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{:<w$} ", marker, field.label(), w = LABEL_WIDTH), label_style),
            Span::styled(shown, Style::default().fg(Color::Cyan)),
        ]));
    }
    lines.push(Line::default());
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    frame.render_widget(Paragraph::new(lines), inner);

    if let Some((row, col)) = cursor.filter(|(row, _)| (*row as u16) < inner.height) {
        let x = inner.x + (LABEL_WIDTH + 3 + col) as u16;
        frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y + row as u16));
    }
}

fn render_scripts(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let height = (app.scripts.len() as u16).max(1) + 2;
    let popup_area = centered(area, 50, height);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Scripts (Enter to run, Esc to close) ");

    if let Some(message) = &app.scripts_error {
        let text = Paragraph::new(message.as_str())
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(text, popup_area);
        return;
    }

    let items: Vec<ListItem> = app
        .scripts
        .iter()
        .map(|script| ListItem::new(format!(" {} ", script.name)))
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, popup_area, &mut app.scripts_state);
}

fn render_script_output(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some((name, output)) = &app.script_output else {
        return;
    };
    let popup_area = centered(area, area.width.saturating_sub(10), area.height.saturating_sub(6));
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(format!(" Script output: {} (Esc to close) ", name));
    let paragraph = Paragraph::new(output.as_str())
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.output_scroll, 0));
    frame.render_widget(paragraph, popup_area);
}
