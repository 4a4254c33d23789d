use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, FocusPane, Popup};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        app.should_quit = true;
        return Ok(());
    }

    app.status = None;

    match app.popup {
        Popup::None => {}
        Popup::Browser => return handle_browser(app, key).await,
        Popup::SaveAs => {
            handle_save_as(app, key);
            return Ok(());
        }
        Popup::Scripts => {
            handle_scripts(app, key);
            return Ok(());
        }
        Popup::ScriptOutput => {
            handle_script_output(app, key);
            return Ok(());
        }
        Popup::Settings => {
            handle_settings(app, key);
            return Ok(());
        }
    }

    if ctrl {
        match key.code {
            KeyCode::Char('o') => app.open_browser().await,
            KeyCode::Char('s') => app.save(),
            KeyCode::Char('n') => app.new_file(),
            KeyCode::Char('w') => app.close_tab(),
            KeyCode::Char('r') => app.reload_config(),
            KeyCode::Char('e') => app.open_settings(),
            KeyCode::Char('p') => app.open_scripts(),
            KeyCode::Char('b') => app.show_file_panel = !app.show_file_panel,
            KeyCode::Char('l') => app.show_ai_panel = !app.show_ai_panel,
            KeyCode::Char('x') => app.session.clear_context(),
            KeyCode::Right => app.next_tab(),
            KeyCode::Left => app.prev_tab(),
            _ => {}
        }
        return Ok(());
    }

    if key.code == KeyCode::Tab {
        app.focus = next_focus(app);
        return Ok(());
    }

    match app.focus {
        FocusPane::Files => handle_files(app, key),
        FocusPane::Editor => handle_editor(app, key),
        FocusPane::Chat => handle_chat(app, key),
    }
    Ok(())
}

/// Tab cycles Files -> Editor -> Chat, skipping hidden panels.
fn next_focus(app: &App) -> FocusPane {
    let order = [FocusPane::Files, FocusPane::Editor, FocusPane::Chat];
    let shown = |pane: &FocusPane| match pane {
        FocusPane::Files => app.show_file_panel,
        FocusPane::Editor => true,
        FocusPane::Chat => app.show_ai_panel,
    };
    let start = order.iter().position(|p| *p == app.focus).unwrap_or(0);
    (1..=order.len())
        .map(|step| order[(start + step) % order.len()])
        .find(shown)
        .unwrap_or(FocusPane::Editor)
}

fn handle_files(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.tree_down(),
        KeyCode::Char('k') | KeyCode::Up => app.tree_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.activate_selected(),
        KeyCode::Char(' ') => app.toggle_selected_context(),
        KeyCode::Char('r') => app.refresh_tree(),
        _ => {}
    }
}

fn handle_editor(app: &mut App, key: KeyEvent) {
    let page = app.editor_height.max(1) as usize;
    match key.code {
        KeyCode::Char(c) => app.edit(|b| {
            b.insert_char(c);
            true
        }),
        KeyCode::Enter => app.edit(|b| {
            b.insert_newline();
            true
        }),
        KeyCode::Backspace => app.edit(|b| b.backspace()),
        KeyCode::Delete => app.edit(|b| b.delete()),
        KeyCode::Left => app.editor_move(|b| b.move_left()),
        KeyCode::Right => app.editor_move(|b| b.move_right()),
        KeyCode::Up => app.editor_move(|b| b.move_up(1)),
        KeyCode::Down => app.editor_move(|b| b.move_down(1)),
        KeyCode::PageUp => app.editor_move(|b| b.move_up(page)),
        KeyCode::PageDown => app.editor_move(|b| b.move_down(page)),
        KeyCode::Home => app.editor_move(|b| b.move_home()),
        KeyCode::End => app.editor_move(|b| b.move_end()),
        _ => {}
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.send_chat(),
        KeyCode::Esc => app.cancel_chat(),
        KeyCode::Char(c) => app.chat_insert(c),
        KeyCode::Backspace => app.chat_backspace(),
        KeyCode::Left => app.chat_left(),
        KeyCode::Right => app.chat_right(),
        KeyCode::Up | KeyCode::PageUp => {
            app.chat_scroll = app.chat_scroll.saturating_sub(if key.code == KeyCode::Up { 1 } else { 10 });
        }
        KeyCode::Down | KeyCode::PageDown => {
            app.chat_scroll = app.chat_scroll.saturating_add(if key.code == KeyCode::Down { 1 } else { 10 });
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    match (app.popup, app.focus) {
        (Popup::SaveAs, _) => app.save_as_edit(|input| input.push_str(text.trim_end_matches(['\r', '\n']))),
        (Popup::Settings, _) => {
            if let Some(form) = app.settings.as_mut() {
                for c in text.chars().filter(|c| !c.is_control()) {
                    form.insert_char(c);
                }
            }
        }
        (Popup::None, FocusPane::Editor) => app.edit(|b| {
            for c in text.chars() {
                match c {
                    '\n' => b.insert_newline(),
                    '\r' => {}
                    c => b.insert_char(c),
                }
            }
            !text.is_empty()
        }),
        (Popup::None, FocusPane::Chat) => {
            for c in text.chars().filter(|c| !c.is_control()) {
                app.chat_insert(c);
            }
        }
        _ => {}
    }
}

async fn handle_browser(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Char('j') | KeyCode::Down => app.browser_move(true),
        KeyCode::Char('k') | KeyCode::Up => app.browser_move(false),
        KeyCode::Char('l') | KeyCode::Right => app.browser_descend().await,
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Backspace => app.browser_up().await,
        KeyCode::Enter => app.browser_confirm(),
        _ => {}
    }
    Ok(())
}

fn handle_save_as(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Enter => app.confirm_save_as(),
        KeyCode::Backspace => app.save_as_edit(|input| {
            input.pop();
        }),
        KeyCode::Char(c) => app.save_as_edit(|input| input.push(c)),
        _ => {}
    }
}

fn handle_scripts(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Char('j') | KeyCode::Down => app.scripts_move(true),
        KeyCode::Char('k') | KeyCode::Up => app.scripts_move(false),
        KeyCode::Enter => app.run_selected_script(),
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        app.save_settings();
        return;
    }
    if key.code == KeyCode::Esc {
        app.close_popup();
        return;
    }
    let Some(form) = app.settings.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Down | KeyCode::Tab => form.select(true),
        KeyCode::Up | KeyCode::BackTab => form.select(false),
        KeyCode::Left => form.left_right(false),
        KeyCode::Right => form.left_right(true),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => form.insert_char(c),
        _ => {}
    }
}

fn handle_script_output(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.close_popup(),
        KeyCode::Char('j') | KeyCode::Down => app.output_scroll = app.output_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.output_scroll = app.output_scroll.saturating_sub(1),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiwriter_core::{Config, ConfigStore};
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn app() -> App {
        App::new(Config::default(), ConfigStore::at("/nonexistent/config.json"))
    }

    #[tokio::test]
    async fn test_typing_marks_tab_modified() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('h'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('i'))).await.unwrap();

        let tab = app.session.tabs().active().unwrap();
        assert!(tab.is_modified());
        assert_eq!(tab.label(), "*Untitled");
        assert_eq!(tab.buffer.lines()[0], "hi");
    }

    #[tokio::test]
    async fn test_tab_skips_hidden_panels() {
        let mut app = app();
        app.show_file_panel = false;
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Chat);
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Editor);
    }

    #[tokio::test]
    async fn test_blank_chat_is_ignored() {
        let mut app = app();
        app.focus = FocusPane::Chat;
        handle_event(&mut app, key(KeyCode::Char(' '))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.session.chat().history().is_empty());
        assert!(!app.session.chat().is_pending());
    }

    #[tokio::test]
    async fn test_ctrl_q_quits() {
        let mut app = app();
        handle_event(&mut app, ctrl('q')).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_settings_dialog_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(Config::default(), ConfigStore::at(dir.path().join("config.json")));
        handle_event(&mut app, ctrl('e')).await.unwrap();
        assert_eq!(app.popup, Popup::Settings);

        // Down to the theme row, then step it
        for _ in 0..6 {
            handle_event(&mut app, key(KeyCode::Down)).await.unwrap();
        }
        handle_event(&mut app, key(KeyCode::Right)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.popup, Popup::None);
        assert_eq!(app.session.config().theme, "cream-navy");
    }

    #[tokio::test]
    async fn test_new_and_switch_tabs() {
        let mut app = app();
        handle_event(&mut app, ctrl('n')).await.unwrap();
        assert_eq!(app.session.tabs().active_index(), Some(1));
        let left = KeyEvent {
            kind: KeyEventKind::Press,
            ..KeyEvent::new(KeyCode::Left, KeyModifiers::CONTROL)
        };
        handle_event(&mut app, AppEvent::Key(left)).await.unwrap();
        assert_eq!(app.session.tabs().active_index(), Some(0));
    }
}
