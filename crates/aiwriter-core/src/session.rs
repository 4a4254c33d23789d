//! The session aggregate the shell talks to.
//!
//! Owns the tabs, the context set, the chat history and the project tree.
//! File and endpoint collaborators are passed in per call so the shell decides
//! what backs them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ai::CompletionEndpoint;
use crate::chat::ChatSessionController;
use crate::config::Config;
use crate::context::ContextSet;
use crate::error::{Result, SessionError};
use crate::files::FileStore;
use crate::mention::{resolve_mentions, ResolvedMention};
use crate::protocol::SaveRequest;
use crate::scripts::{list_scripts, ScriptEntry};
use crate::state::ChatMessage;
use crate::tabs::{EditorBuffer, SaveOutcome, Tab, TabManager};
use crate::tree::{build_tree, FileNode};

pub struct Session<B> {
    config: Config,
    tabs: TabManager<B>,
    context: ContextSet,
    chat: ChatSessionController,
    root: Option<PathBuf>,
    tree: Vec<FileNode>,
}

impl<B: EditorBuffer> Session<B> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tabs: TabManager::new(),
            context: ContextSet::new(),
            chat: ChatSessionController::new(),
            root: None,
            tree: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tabs(&self) -> &TabManager<B> {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabManager<B> {
        &mut self.tabs
    }

    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextSet {
        &mut self.context
    }

    pub fn chat(&self) -> &ChatSessionController {
        &self.chat
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn tree(&self) -> &[FileNode] {
        &self.tree
    }

    /// Makes `path` the project root and loads its tree. The context set is
    /// left as it is.
    pub fn open_folder(&mut self, path: &str) -> Result<()> {
        let dir = PathBuf::from(path);
        if !dir.is_dir() {
            let err = SessionError::io(path, "Not a directory");
            self.report(&err);
            return Err(err);
        }
        info!(root = %dir.display(), "opened folder");
        self.root = Some(dir);
        self.refresh_tree();
        Ok(())
    }

    pub fn refresh_tree(&mut self) {
        self.tree = match &self.root {
            Some(root) => build_tree(root),
            None => Vec::new(),
        };
        debug!(top_level = self.tree.len(), "tree refreshed");
    }

    /// Opens `path` in a tab, or activates the tab that already has it.
    pub fn open_file<F: FileStore>(&mut self, files: &F, path: &str) -> Result<usize> {
        if let Some(index) = self.tabs.find(path) {
            self.tabs.switch_to(index);
            return Ok(index);
        }
        match files.read(path).into_result(path) {
            Ok(content) => Ok(self.tabs.open(path, &content)),
            Err(e) => {
                self.chat
                    .push_notice(ChatMessage::error(format!("Error opening file: {}", e)));
                Err(e)
            }
        }
    }

    pub fn new_file(&mut self) -> usize {
        self.tabs.new_scratch()
    }

    /// Marks the active tab dirty after an edit.
    pub fn mark_active_modified(&mut self) -> bool {
        match self.tabs.active_index() {
            Some(index) => self.tabs.mark_modified(index),
            None => false,
        }
    }

    /// Saves the active tab. [`SessionError::NoPath`] means the shell should
    /// ask for a destination and call [`Session::save_active_as`].
    pub fn save_active<F: FileStore>(&mut self, files: &F) -> Result<SaveOutcome> {
        let index = self.active_index()?;
        let outcome = self.tabs.save(index, |path, content| write_through(files, path, content));
        self.after_save(index, outcome)
    }

    /// Saves the active tab to `path`.
    ///
    /// An existing file that is not the tab's own is left alone unless
    /// `overwrite` is set; [`SessionError::AlreadyExists`] asks the shell to
    /// confirm first and adds nothing to the chat.
    pub fn save_active_as<F: FileStore>(
        &mut self,
        files: &F,
        path: &str,
        overwrite: bool,
    ) -> Result<SaveOutcome> {
        let index = self.active_index()?;
        let own_path = self.tabs.get(index).and_then(|t| t.path()) == Some(path);
        if !overwrite && !own_path && files.exists(path) {
            debug!(%path, "save-as target exists");
            return Err(SessionError::AlreadyExists(path.to_string()));
        }
        let outcome = self
            .tabs
            .save_as(index, path, |path, content| write_through(files, path, content));
        let outcome = self.after_save(index, outcome)?;
        if self.root.as_deref().is_some_and(|root| Path::new(path).starts_with(root)) {
            self.refresh_tree();
        }
        Ok(outcome)
    }

    fn after_save(&mut self, index: usize, outcome: Result<SaveOutcome>) -> Result<SaveOutcome> {
        match outcome {
            Ok(SaveOutcome::Written) => {
                let name = self.tabs.get(index).map(|t| t.name().to_string()).unwrap_or_default();
                self.chat.push_notice(ChatMessage::system(format!("Saved {}", name)));
                Ok(SaveOutcome::Written)
            }
            Ok(SaveOutcome::Unchanged) => Ok(SaveOutcome::Unchanged),
            Err(SessionError::NoPath) => Err(SessionError::NoPath),
            Err(e) => {
                self.chat
                    .push_notice(ChatMessage::error(format!("Error saving file: {}", e)));
                Err(e)
            }
        }
    }

    /// Closes the active tab; unsaved edits are discarded with it.
    pub fn close_active(&mut self) -> Option<Tab<B>> {
        let index = self.tabs.active_index()?;
        self.tabs.close(index)
    }

    /// Flips a file's context membership. Directories and missing paths are
    /// ignored and report `false`.
    pub fn toggle_context(&mut self, path: &str) -> bool {
        if !Path::new(path).is_file() {
            debug!(%path, "only files can be in context");
            return false;
        }
        self.context.toggle(path)
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Sends `text` and waits for the reply. `Ok(None)` for blank input.
    pub async fn send_chat<E: CompletionEndpoint>(
        &mut self,
        endpoint: &E,
        text: &str,
    ) -> Result<Option<ChatMessage>> {
        let active = self.tabs.active().and_then(|t| t.path());
        let reply = self.chat.send(endpoint, text, &self.context, active).await?;
        Ok(reply.cloned())
    }

    /// Sends `text` on a background task; see [`Session::poll_chat`].
    pub fn dispatch_chat<E: CompletionEndpoint>(&mut self, endpoint: Arc<E>, text: &str) -> Result<bool> {
        let active = self.tabs.active().and_then(|t| t.path());
        self.chat.dispatch(endpoint, text, &self.context, active)
    }

    pub fn poll_chat(&mut self) -> Option<ChatMessage> {
        self.chat.poll().cloned()
    }

    pub fn cancel_chat(&mut self) -> bool {
        self.chat.cancel()
    }

    /// Project files named by `@mentions` in `text`, for display only.
    pub fn mentions(&self, text: &str) -> Vec<ResolvedMention> {
        resolve_mentions(&self.tree, text)
    }

    pub fn scripts(&self) -> Result<Vec<ScriptEntry>> {
        let root = self.root.as_deref().ok_or(SessionError::NoFolder)?;
        list_scripts(root)
    }

    /// Swaps in a freshly loaded config. Open tabs and history are kept.
    pub fn apply_config(&mut self, config: Config) {
        if config.llama_cpp_url != self.config.llama_cpp_url {
            info!(url = %config.llama_cpp_url, "completion endpoint changed");
        }
        self.config = config;
    }

    /// Records a failure raised outside the session, such as a script error.
    pub fn report(&mut self, err: &SessionError) {
        warn!(error = %err, "reported");
        self.chat.push_notice(ChatMessage::error(err.to_string()));
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.chat.push_notice(ChatMessage::system(text));
    }

    fn active_index(&self) -> Result<usize> {
        self.tabs.active_index().ok_or(SessionError::NoSuchTab(0))
    }
}

fn write_through<F: FileStore>(files: &F, path: &str, content: &str) -> Result<()> {
    files
        .save(SaveRequest {
            path: path.to_string(),
            content: content.to_string(),
        })
        .into_result(path)
}
