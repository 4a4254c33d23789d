use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use futures_util::FutureExt;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use aiwriter_core::browser::FolderBrowser;
use aiwriter_core::protocol::ScriptOutput;
use aiwriter_core::scripts::{self, ScriptEntry};
use aiwriter_core::tree::{flatten, TreeRow};
use aiwriter_core::{
    Config, ConfigStore, LlamaCppClient, LocalFiles, SaveOutcome, Session, SessionError,
};

use crate::buffer::{char_to_byte_index, TextArea};
use crate::settings::SettingsForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Files,
    Editor,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Browser,
    SaveAs,
    Scripts,
    ScriptOutput,
    Settings,
}

/// A script running in the background. Dropping it kills the script.
pub struct ScriptRun {
    pub name: String,
    handle: JoinHandle<ScriptOutput>,
}

impl Drop for ScriptRun {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub popup: Popup,
    pub status: Option<String>,
    pub session: Session<TextArea>,
    pub files: LocalFiles,
    store: ConfigStore,

    // Completion endpoint
    pub client: Arc<LlamaCppClient>,
    pub model_name: Option<String>,
    model_probe: Option<JoinHandle<Option<String>>>,

    // File panel
    pub expanded: HashSet<String>,
    pub tree_state: ListState,
    pub show_file_panel: bool,
    pub show_ai_panel: bool,

    // Chat input
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_scroll: u16,

    // Folder browser dialog
    pub browser: Option<FolderBrowser<LocalFiles>>,
    pub browser_state: ListState,
    picked_folder: Rc<RefCell<Option<String>>>,

    // Save-as prompt
    pub save_as_input: String,
    /// Existing path the user was warned about; Enter again overwrites it.
    pub save_as_confirm: Option<String>,

    // Settings dialog
    pub settings: Option<SettingsForm>,

    // Scripts
    pub scripts: Vec<ScriptEntry>,
    pub scripts_error: Option<String>,
    pub scripts_state: ListState,
    pub script_run: Option<ScriptRun>,
    pub script_output: Option<(String, String)>,
    pub output_scroll: u16,

    // Layout feedback from the last render
    pub editor_height: u16,

    // Animation state
    pub animation_frame: u8,
}

impl App {
    pub fn new(config: Config, store: ConfigStore) -> Self {
        let client = Arc::new(LlamaCppClient::new(&config));
        let mut app = Self {
            should_quit: false,
            focus: FocusPane::Editor,
            popup: Popup::None,
            status: None,
            show_file_panel: config.show_file_panel,
            show_ai_panel: config.show_ai_panel,
            session: Session::new(config),
            files: LocalFiles,
            store,
            client,
            model_name: None,
            model_probe: None,
            expanded: HashSet::new(),
            tree_state: ListState::default(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            browser: None,
            browser_state: ListState::default(),
            picked_folder: Rc::new(RefCell::new(None)),
            save_as_input: String::new(),
            save_as_confirm: None,
            settings: None,
            scripts: Vec::new(),
            scripts_error: None,
            scripts_state: ListState::default(),
            script_run: None,
            script_output: None,
            output_scroll: 0,
            editor_height: 0,
            animation_frame: 0,
        };
        app.session.new_file();
        app.probe_models();
        app
    }

    pub fn tick(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;

        if self.session.poll_chat().is_some() {
            self.chat_scroll = u16::MAX;
        }

        if self.model_probe.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(Ok(model)) = self.model_probe.take().and_then(|h| h.now_or_never()) {
                self.model_name = model;
            }
        }

        if self.script_run.as_ref().is_some_and(|run| run.handle.is_finished()) {
            if let Some(mut run) = self.script_run.take() {
                match (&mut run.handle).now_or_never() {
                    Some(Ok(output)) => {
                        self.script_output = Some((run.name.clone(), output.render()));
                        self.output_scroll = 0;
                        self.popup = Popup::ScriptOutput;
                    }
                    Some(Err(e)) => warn!(error = %e, "script task failed"),
                    None => {}
                }
            }
        }
    }

    fn probe_models(&mut self) {
        let client = Arc::clone(&self.client);
        self.model_probe = Some(tokio::spawn(async move {
            match client.list_models().await {
                Ok(models) => models.into_iter().next(),
                Err(e) => {
                    warn!(error = %e, "could not list models");
                    None
                }
            }
        }));
    }

    /// Re-reads the settings file and applies it.
    pub fn reload_config(&mut self) {
        match self.store.load() {
            Ok(config) => {
                self.apply_config(config);
                let notice = format!("Settings reloaded from {}", self.store.path().display());
                self.session.notify(notice);
            }
            Err(e) => {
                warn!(error = %e, "settings reload failed");
                self.session.report(&SessionError::Config(format!("{:#}", e)));
            }
        }
    }

    fn apply_config(&mut self, config: Config) {
        self.client = Arc::new(LlamaCppClient::new(&config));
        self.show_file_panel = config.show_file_panel;
        self.show_ai_panel = config.show_ai_panel;
        self.session.apply_config(config);
        self.model_name = None;
        self.probe_models();
    }

    // Settings dialog

    pub fn open_settings(&mut self) {
        self.settings = Some(SettingsForm::from_config(self.session.config()));
        self.popup = Popup::Settings;
    }

    /// Validates the form, writes it, then applies what the store reads back.
    /// A bad value keeps the dialog open with the reason.
    pub fn save_settings(&mut self) {
        let Some(form) = self.settings.as_mut() else {
            return;
        };
        let saved = form
            .to_config()
            .map_err(anyhow::Error::from)
            .and_then(|config| self.store.save(&config))
            .and_then(|()| self.store.load());

        match saved {
            Ok(config) => {
                self.settings = None;
                self.popup = Popup::None;
                self.apply_config(config);
                let notice = format!("Settings saved to {}", self.store.path().display());
                self.session.notify(notice);
            }
            Err(e) => {
                warn!(error = %e, "settings not saved");
                form.error = Some(format!("{:#}", e));
            }
        }
    }

    // File panel

    pub fn open_folder(&mut self, path: &str) {
        if self.session.open_folder(path).is_ok() {
            self.expanded.clear();
            let first = (!self.session.tree().is_empty()).then_some(0);
            self.tree_state.select(first);
            self.focus = FocusPane::Files;
        }
    }

    pub fn refresh_tree(&mut self) {
        self.session.refresh_tree();
        let len = self.visible_rows().len();
        if let Some(selected) = self.tree_state.selected() {
            self.tree_state.select((len > 0).then(|| selected.min(len - 1)));
        }
    }

    pub fn visible_rows(&self) -> Vec<TreeRow<'_>> {
        flatten(self.session.tree(), &|path| self.expanded.contains(path))
    }

    fn selected_node(&self) -> Option<(String, bool)> {
        let rows = self.visible_rows();
        let row = rows.get(self.tree_state.selected()?)?;
        Some((row.node.path.clone(), row.node.is_dir))
    }

    pub fn tree_down(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let next = self.tree_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.tree_state.select(Some(next));
    }

    pub fn tree_up(&mut self) {
        let prev = self.tree_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.tree_state.select(Some(prev));
    }

    /// Expands or collapses a folder, opens a file.
    pub fn activate_selected(&mut self) {
        let Some((path, is_dir)) = self.selected_node() else {
            return;
        };
        if is_dir {
            if !self.expanded.remove(&path) {
                self.expanded.insert(path);
            }
        } else if self.session.open_file(&self.files, &path).is_ok() {
            self.focus = FocusPane::Editor;
        }
    }

    pub fn toggle_selected_context(&mut self) {
        if let Some((path, false)) = self.selected_node() {
            self.session.toggle_context(&path);
        }
    }

    // Tab methods

    pub fn new_file(&mut self) {
        self.session.new_file();
        self.focus = FocusPane::Editor;
    }

    /// Closes the active tab. There is always at least one tab afterwards.
    pub fn close_tab(&mut self) {
        if let Some(tab) = self.session.close_active() {
            if tab.is_modified() {
                self.status = Some(format!("Closed {} without saving", tab.name()));
            }
        }
        if self.session.tabs().is_empty() {
            self.session.new_file();
        }
    }

    pub fn next_tab(&mut self) {
        let tabs = self.session.tabs_mut();
        if let Some(active) = tabs.active_index() {
            let len = tabs.len();
            tabs.switch_to((active + 1) % len);
        }
    }

    pub fn prev_tab(&mut self) {
        let tabs = self.session.tabs_mut();
        if let Some(active) = tabs.active_index() {
            let len = tabs.len();
            tabs.switch_to((active + len - 1) % len);
        }
    }

    pub fn save(&mut self) {
        match self.session.save_active(&self.files) {
            Err(SessionError::NoPath) => self.open_save_as(),
            Ok(SaveOutcome::Unchanged) => {
                self.status = Some("No changes to save".to_string());
            }
            _ => {}
        }
    }

    pub fn open_save_as(&mut self) {
        let mut input = self
            .session
            .root()
            .map(|root| root.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !input.is_empty() && !input.ends_with(std::path::MAIN_SEPARATOR) {
            input.push(std::path::MAIN_SEPARATOR);
        }
        self.save_as_input = input;
        self.save_as_confirm = None;
        self.popup = Popup::SaveAs;
    }

    /// Saves to the typed path. An existing file needs a second Enter.
    pub fn confirm_save_as(&mut self) {
        let path = self.save_as_input.trim().to_string();
        if path.is_empty() {
            return;
        }
        let overwrite = self.save_as_confirm.as_deref() == Some(path.as_str());
        match self.session.save_active_as(&self.files, &path, overwrite) {
            Ok(_) => {
                self.save_as_confirm = None;
                self.popup = Popup::None;
            }
            Err(SessionError::AlreadyExists(existing)) => self.save_as_confirm = Some(existing),
            Err(_) => {}
        }
    }

    pub fn save_as_edit(&mut self, f: impl FnOnce(&mut String)) {
        f(&mut self.save_as_input);
        self.save_as_confirm = None;
    }

    // Editor

    pub fn buffer_mut(&mut self) -> Option<&mut TextArea> {
        self.session.tabs_mut().active_mut().map(|tab| &mut tab.buffer)
    }

    /// Applies an edit and marks the tab dirty if it changed anything.
    pub fn edit(&mut self, f: impl FnOnce(&mut TextArea) -> bool) {
        let changed = self.buffer_mut().is_some_and(f);
        if changed {
            self.session.mark_active_modified();
        }
    }

    pub fn editor_move(&mut self, f: impl FnOnce(&mut TextArea)) {
        if let Some(buffer) = self.buffer_mut() {
            f(buffer);
        }
    }

    // Chat input

    pub fn chat_insert(&mut self, c: char) {
        let at = char_to_byte_index(&self.chat_input, self.chat_cursor);
        self.chat_input.insert(at, c);
        self.chat_cursor += 1;
    }

    pub fn chat_backspace(&mut self) {
        if self.chat_cursor > 0 {
            let at = char_to_byte_index(&self.chat_input, self.chat_cursor - 1);
            self.chat_input.remove(at);
            self.chat_cursor -= 1;
        }
    }

    pub fn chat_left(&mut self) {
        self.chat_cursor = self.chat_cursor.saturating_sub(1);
    }

    pub fn chat_right(&mut self) {
        self.chat_cursor = (self.chat_cursor + 1).min(self.chat_input.chars().count());
    }

    pub fn send_chat(&mut self) {
        match self.session.dispatch_chat(Arc::clone(&self.client), &self.chat_input) {
            Ok(true) => {
                self.chat_input.clear();
                self.chat_cursor = 0;
                self.chat_scroll = u16::MAX;
            }
            Ok(false) => {}
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    pub fn cancel_chat(&mut self) {
        if self.session.cancel_chat() {
            self.chat_scroll = u16::MAX;
        }
    }

    // Folder browser methods

    pub async fn open_browser(&mut self) {
        let start = self
            .session
            .root()
            .map(|root| root.to_string_lossy().into_owned())
            .or_else(|| self.session.config().default_folder().map(str::to_string))
            .unwrap_or_default();

        let picked = Rc::clone(&self.picked_folder);
        let mut browser = FolderBrowser::new(self.files, move |path| {
            *picked.borrow_mut() = Some(path);
        });
        browser.navigate(&start).await;
        self.browser = Some(browser);
        self.browser_state.select(None);
        self.popup = Popup::Browser;
    }

    pub fn browser_move(&mut self, down: bool) {
        let Some(browser) = self.browser.as_mut() else {
            return;
        };
        let entries = browser.state().entries();
        if entries.is_empty() {
            return;
        }
        let next = match (self.browser_state.selected(), down) {
            (None, _) => 0,
            (Some(i), true) => (i + 1).min(entries.len() - 1),
            (Some(i), false) => i.saturating_sub(1),
        };
        let path = entries[next].path.clone();
        browser.select_entry(&path);
        self.browser_state.select(Some(next));
    }

    pub async fn browser_descend(&mut self) {
        let Some(browser) = self.browser.as_mut() else {
            return;
        };
        let Some(target) = self
            .browser_state
            .selected()
            .and_then(|i| browser.state().entries().get(i))
            .map(|entry| entry.path.clone())
        else {
            return;
        };
        browser.navigate(&target).await;
        self.browser_state.select(None);
    }

    pub async fn browser_up(&mut self) {
        if let Some(browser) = self.browser.as_mut() {
            browser.up().await;
            self.browser_state.select(None);
        }
    }

    pub fn browser_confirm(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        if browser.confirm().is_none() {
            self.browser = Some(browser);
            return;
        }
        self.popup = Popup::None;
        let picked = self.picked_folder.borrow_mut().take();
        if let Some(path) = picked {
            info!(%path, "folder picked");
            self.open_folder(&path);
        }
    }

    pub fn close_popup(&mut self) {
        self.popup = Popup::None;
        self.browser = None;
        self.save_as_confirm = None;
        self.settings = None;
    }

    // Scripts

    pub fn open_scripts(&mut self) {
        match self.session.scripts() {
            Ok(list) => {
                self.scripts_error = list
                    .is_empty()
                    .then(|| "No .py files in scripts/".to_string());
                self.scripts_state.select((!list.is_empty()).then_some(0));
                self.scripts = list;
            }
            Err(SessionError::NoFolder) => {
                self.scripts.clear();
                self.scripts_error = Some("Open a folder that contains a 'scripts' folder.".to_string());
            }
            Err(e) => {
                self.scripts.clear();
                self.scripts_error = Some(e.to_string());
            }
        }
        self.popup = Popup::Scripts;
    }

    pub fn scripts_move(&mut self, down: bool) {
        if self.scripts.is_empty() {
            return;
        }
        let current = self.scripts_state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(self.scripts.len() - 1)
        } else {
            current.saturating_sub(1)
        };
        self.scripts_state.select(Some(next));
    }

    pub fn run_selected_script(&mut self) {
        let Some(script) = self
            .scripts_state
            .selected()
            .and_then(|i| self.scripts.get(i))
            .cloned()
        else {
            return;
        };
        self.popup = Popup::None;
        self.status = Some(format!("Running {}…", script.name));
        let path = script.path;
        let handle = tokio::spawn(async move {
            scripts::run_script(&path, scripts::DEFAULT_INTERPRETER, scripts::SCRIPT_TIMEOUT).await
        });
        self.script_run = Some(ScriptRun {
            name: script.name,
            handle,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Field;
    use std::fs;

    fn app_with_folder() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("chapters")).unwrap();
        fs::write(dir.path().join("chapters").join("one.md"), "Once.").unwrap();
        fs::write(dir.path().join("notes.md"), "Notes.").unwrap();

        let store = ConfigStore::at(dir.path().join("config.json"));
        let mut app = App::new(Config::default(), store);
        app.open_folder(&dir.path().to_string_lossy());
        (app, dir)
    }

    #[tokio::test]
    async fn test_starts_with_scratch_tab() {
        let app = App::new(Config::default(), ConfigStore::at("/nonexistent/config.json"));
        assert_eq!(app.session.tabs().len(), 1);
        assert!(app.session.tabs().active().unwrap().is_scratch());
    }

    #[tokio::test]
    async fn test_expand_and_open_from_tree() {
        let (mut app, _dir) = app_with_folder();
        assert_eq!(app.visible_rows().len(), 2);

        app.activate_selected();
        let rows: Vec<_> = app.visible_rows().iter().map(|r| r.node.name.clone()).collect();
        assert_eq!(rows, vec!["chapters", "one.md", "notes.md"]);

        app.tree_down();
        app.activate_selected();
        assert_eq!(app.focus, FocusPane::Editor);
        assert_eq!(app.session.tabs().active().unwrap().name(), "one.md");
    }

    #[tokio::test]
    async fn test_context_toggle_ignores_folders() {
        let (mut app, _dir) = app_with_folder();
        app.toggle_selected_context();
        assert!(app.session.context().is_empty());

        app.tree_down();
        app.toggle_selected_context();
        assert_eq!(app.session.context().size(), 1);
    }

    #[tokio::test]
    async fn test_closing_last_tab_leaves_scratch() {
        let mut app = App::new(Config::default(), ConfigStore::at("/nonexistent/config.json"));
        app.edit(|b| {
            b.insert_char('x');
            true
        });
        app.close_tab();
        assert_eq!(app.session.tabs().len(), 1);
        assert!(!app.session.tabs().active().unwrap().is_modified());
        assert_eq!(app.status.as_deref(), Some("Closed Untitled without saving"));
    }

    #[tokio::test]
    async fn test_saving_scratch_prompts_for_path() {
        let (mut app, dir) = app_with_folder();
        app.edit(|b| {
            b.insert_char('x');
            true
        });
        app.save();
        assert_eq!(app.popup, Popup::SaveAs);

        app.save_as_input = dir.path().join("new.md").to_string_lossy().into_owned();
        app.confirm_save_as();
        assert_eq!(app.popup, Popup::None);
        assert_eq!(fs::read_to_string(dir.path().join("new.md")).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_save_as_existing_file_asks_first() {
        let (mut app, dir) = app_with_folder();
        let notes = dir.path().join("notes.md");
        app.edit(|b| {
            b.insert_char('x');
            true
        });
        app.open_save_as();
        app.save_as_input = notes.to_string_lossy().into_owned();

        app.confirm_save_as();
        assert_eq!(app.popup, Popup::SaveAs);
        assert!(app.save_as_confirm.is_some());
        assert_eq!(fs::read_to_string(&notes).unwrap(), "Notes.");

        app.confirm_save_as();
        assert_eq!(app.popup, Popup::None);
        assert_eq!(fs::read_to_string(&notes).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_editing_path_drops_overwrite_warning() {
        let (mut app, dir) = app_with_folder();
        app.open_save_as();
        app.save_as_input = dir.path().join("notes.md").to_string_lossy().into_owned();
        app.confirm_save_as();
        assert!(app.save_as_confirm.is_some());

        app.save_as_edit(|input| {
            input.pop();
        });
        assert_eq!(app.save_as_confirm, None);
    }

    #[tokio::test]
    async fn test_settings_saved_and_applied() {
        let (mut app, dir) = app_with_folder();
        app.open_settings();
        assert_eq!(app.popup, Popup::Settings);

        let form = app.settings.as_mut().unwrap();
        while form.selected_field() != Field::FilePanel {
            form.select(true);
        }
        form.insert_char(' ');
        app.save_settings();

        assert_eq!(app.popup, Popup::None);
        assert!(!app.show_file_panel);
        assert!(!app.session.config().show_file_panel);
        let stored = ConfigStore::at(dir.path().join("config.json")).load().unwrap();
        assert!(!stored.show_file_panel);
    }

    #[tokio::test]
    async fn test_invalid_settings_keep_dialog_open() {
        let (mut app, dir) = app_with_folder();
        app.open_settings();
        let form = app.settings.as_mut().unwrap();
        while form.selected_field() != Field::Temperature {
            form.select(true);
        }
        form.insert_char('x');
        app.save_settings();

        assert_eq!(app.popup, Popup::Settings);
        assert!(app.settings.as_ref().unwrap().error.is_some());
        assert!(!dir.path().join("config.json").exists());
        assert_eq!(app.session.config().temperature, 0.7);
    }

    #[tokio::test]
    async fn test_browser_picks_folder() {
        let (mut app, dir) = app_with_folder();
        app.open_browser().await;
        assert_eq!(app.popup, Popup::Browser);

        app.browser_move(true);
        app.browser_confirm();
        assert_eq!(app.popup, Popup::None);
        assert!(app.session.root().unwrap().ends_with("chapters"));
        assert!(dir.path().join("chapters").is_dir());
    }

    #[tokio::test]
    async fn test_scripts_without_folder() {
        let mut app = App::new(Config::default(), ConfigStore::at("/nonexistent/config.json"));
        app.open_scripts();
        assert_eq!(app.popup, Popup::Scripts);
        assert!(app.scripts_error.as_deref().unwrap().contains("scripts"));
    }

    #[tokio::test]
    async fn test_chat_input_is_char_safe() {
        let mut app = App::new(Config::default(), ConfigStore::at("/nonexistent/config.json"));
        for c in "héllo".chars() {
            app.chat_insert(c);
        }
        app.chat_left();
        app.chat_left();
        app.chat_backspace();
        assert_eq!(app.chat_input, "hélo");
    }
}
