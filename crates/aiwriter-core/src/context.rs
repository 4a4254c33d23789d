//! Files selected for inclusion in chat requests.

use std::collections::BTreeSet;
use tracing::debug;

/// Notification sent to whoever mirrors the set (e.g. tree-view checkboxes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextChange {
    Added(String),
    Removed(String),
    /// Everything was dropped; mirrors must re-sync from scratch.
    Cleared,
}

type Listener = Box<dyn FnMut(&ContextChange)>;

/// Set of context file paths.
///
/// Ordered so that [`ContextSet::to_list`] is deterministic. The active tab is
/// never added implicitly; request assembly takes care of that.
#[derive(Default)]
pub struct ContextSet {
    paths: BTreeSet<String>,
    listener: Option<Listener>,
}

impl std::fmt::Debug for ContextSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSet").field("paths", &self.paths).finish()
    }
}

impl ContextSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&ContextChange) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Returns true if the path was not already present.
    pub fn add(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.paths.contains(&path) {
            return false;
        }
        debug!(%path, "context add");
        self.paths.insert(path.clone());
        self.notify(ContextChange::Added(path));
        true
    }

    /// Returns true if the path was present.
    pub fn remove(&mut self, path: &str) -> bool {
        if !self.paths.remove(path) {
            return false;
        }
        debug!(%path, "context remove");
        self.notify(ContextChange::Removed(path.to_string()));
        true
    }

    /// Flips membership; returns the new state.
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.has(path) {
            self.remove(path);
            false
        } else {
            self.add(path);
            true
        }
    }

    /// Always notifies, even when already empty, so mirrors resync.
    pub fn clear(&mut self) {
        debug!(count = self.paths.len(), "context clear");
        self.paths.clear();
        self.notify(ContextChange::Cleared);
    }

    pub fn has(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn size(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn to_list(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Toolbar text, e.g. "Context: 1 file"
    pub fn label(&self) -> String {
        let count = self.paths.len();
        format!("Context: {} file{}", count, if count == 1 { "" } else { "s" })
    }

    fn notify(&mut self, change: ContextChange) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&change);
        }
    }
}
