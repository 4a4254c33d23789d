//! Open editor tabs, the active index, and dirty tracking.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, SessionError};

/// The text component behind a tab. Owned by the tab, implemented by the shell.
pub trait EditorBuffer {
    fn from_text(text: &str) -> Self
    where
        Self: Sized;

    fn text(&self) -> String;

    /// Called when the tab becomes (or stops being) the visible one.
    fn set_visible(&mut self, _visible: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Nothing changed since the last save, so no write was issued.
    Unchanged,
}

#[derive(Debug)]
pub struct Tab<B> {
    path: Option<String>,
    name: String,
    modified: bool,
    pub buffer: B,
}

impl<B> Tab<B> {
    /// An empty path counts as no path.
    fn new(path: Option<String>, buffer: B) -> Self {
        let path = path.filter(|p| !p.is_empty());
        let name = display_name(path.as_deref());
        Self {
            path,
            name,
            modified: false,
            buffer,
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_scratch(&self) -> bool {
        self.path.is_none()
    }

    /// Tab bar label: the name, starred while there are unsaved edits
    pub fn label(&self) -> String {
        if self.modified {
            format!("*{}", self.name)
        } else {
            self.name.clone()
        }
    }

    fn set_path(&mut self, path: String) {
        self.name = display_name(Some(&path));
        self.path = Some(path);
    }
}

fn display_name(path: Option<&str>) -> String {
    path.and_then(|p| Path::new(p).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

type LabelListener = Box<dyn FnMut(usize, &str)>;

/// Ordered tabs with at most one tab per file path.
pub struct TabManager<B> {
    tabs: Vec<Tab<B>>,
    active: Option<usize>,
    on_label: Option<LabelListener>,
}

impl<B> Default for TabManager<B> {
    fn default() -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            on_label: None,
        }
    }
}

impl<B: EditorBuffer> TabManager<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(index, new_label)` whenever a tab's label changes.
    pub fn set_label_listener(&mut self, listener: impl FnMut(usize, &str) + 'static) {
        self.on_label = Some(Box::new(listener));
    }

    /// Opens `path`, or activates the tab that already has it.
    ///
    /// An existing tab keeps its buffer and edits; `content` is ignored then.
    pub fn open(&mut self, path: &str, content: &str) -> usize {
        if let Some(index) = self.find(path) {
            self.switch_to(index);
            return index;
        }

        debug!(%path, "opening tab");
        self.push(Tab::new(Some(path.to_string()), B::from_text(content)))
    }

    /// New pathless buffer, activated.
    pub fn new_scratch(&mut self) -> usize {
        self.push(Tab::new(None, B::from_text("")))
    }

    fn push(&mut self, tab: Tab<B>) -> usize {
        self.tabs.push(tab);
        let index = self.tabs.len() - 1;
        self.switch_to(index);
        index
    }

    /// Returns false when nothing changed (already active or out of bounds).
    pub fn switch_to(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() || self.active == Some(index) {
            return false;
        }
        if let Some(current) = self.active {
            self.tabs[current].buffer.set_visible(false);
        }
        self.tabs[index].buffer.set_visible(true);
        self.active = Some(index);
        true
    }

    /// Returns true only on the clean-to-dirty transition.
    pub fn mark_modified(&mut self, index: usize) -> bool {
        let Some(tab) = self.tabs.get_mut(index) else {
            return false;
        };
        if tab.modified {
            return false;
        }
        tab.modified = true;
        self.label_changed(index);
        true
    }

    /// Removes a tab without saving. Unsaved content is dropped with it.
    pub fn close(&mut self, index: usize) -> Option<Tab<B>> {
        if index >= self.tabs.len() {
            return None;
        }

        let removed = self.tabs.remove(index);
        let len = self.tabs.len();

        self.active = match self.active {
            _ if len == 0 => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active == index => {
                let next = index.min(len - 1);
                self.tabs[next].buffer.set_visible(true);
                Some(next)
            }
            other => other,
        };

        debug!(index, remaining = len, active = ?self.active, "closed tab");
        Some(removed)
    }

    /// Writes the tab through `write(path, content)` if it has unsaved edits.
    ///
    /// A second save with no edits in between issues no write.
    pub fn save<F>(&mut self, index: usize, write: F) -> Result<SaveOutcome>
    where
        F: FnOnce(&str, &str) -> Result<()>,
    {
        let tab = self.tabs.get_mut(index).ok_or(SessionError::NoSuchTab(index))?;
        let path = tab.path.clone().ok_or(SessionError::NoPath)?;

        if !tab.modified {
            debug!(%path, "save skipped, no changes");
            return Ok(SaveOutcome::Unchanged);
        }

        write(&path, &tab.buffer.text())?;
        tab.modified = false;
        info!(%path, "saved");
        self.label_changed(index);
        Ok(SaveOutcome::Written)
    }

    /// Gives the tab a destination and writes it unconditionally.
    pub fn save_as<F>(&mut self, index: usize, path: &str, write: F) -> Result<SaveOutcome>
    where
        F: FnOnce(&str, &str) -> Result<()>,
    {
        if index >= self.tabs.len() {
            return Err(SessionError::NoSuchTab(index));
        }
        if self.find(path).is_some_and(|other| other != index) {
            return Err(SessionError::PathAlreadyOpen(path.to_string()));
        }

        let tab = &mut self.tabs[index];
        write(path, &tab.buffer.text())?;
        tab.set_path(path.to_string());
        tab.modified = false;
        info!(%path, "saved as");
        self.label_changed(index);
        Ok(SaveOutcome::Written)
    }

    fn label_changed(&mut self, index: usize) {
        if let (Some(listener), Some(tab)) = (self.on_label.as_mut(), self.tabs.get(index)) {
            listener(index, &tab.label());
        }
    }
}

impl<B> TabManager<B> {
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Tab<B>> {
        self.active.and_then(|i| self.tabs.get(i))
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab<B>> {
        self.active.and_then(|i| self.tabs.get_mut(i))
    }

    pub fn get(&self, index: usize) -> Option<&Tab<B>> {
        self.tabs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tab<B>> {
        self.tabs.get_mut(index)
    }

    pub fn find(&self, path: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.path.as_deref() == Some(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab<B>> {
        self.tabs.iter()
    }

    pub fn any_modified(&self) -> bool {
        self.tabs.iter().any(|t| t.modified)
    }
}
