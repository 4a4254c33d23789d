//! Navigation state for the "open folder" and "browse" dialogs.

use tracing::{debug, warn};

use crate::files::DirectoryLister;
use crate::protocol::DirEntry;

/// Where the dialog is and what is highlighted.
///
/// `selection`, when set, is always `current_path` or one of `entries`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderBrowserState {
    current_path: String,
    parent_path: Option<String>,
    entries: Vec<DirEntry>,
    selection: Option<String>,
    error: Option<String>,
}

impl FolderBrowserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn parent_path(&self) -> Option<&str> {
        self.parent_path.as_deref()
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Reason the last navigation came back empty, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_go_up(&self) -> bool {
        self.parent_path.is_some()
    }

    /// Lists `path` and moves there. Never fails: a listing error leaves an
    /// empty entry list and a reason in [`FolderBrowserState::error`].
    pub async fn navigate<L: DirectoryLister>(&mut self, lister: &L, path: &str) -> &Self {
        self.selection = None;
        match lister.list_dirs(path).await {
            Ok(listing) => {
                debug!(path = %listing.current, dirs = listing.dirs.len(), "browse");
                self.current_path = listing.current;
                self.parent_path = listing.parent.filter(|p| !p.is_empty());
                self.entries = listing.dirs;
                self.error = None;
            }
            Err(e) => {
                warn!(%path, error = %e, "browse failed");
                self.current_path = path.to_string();
                self.parent_path = None;
                self.entries.clear();
                self.error = Some(e.to_string());
            }
        }
        self
    }

    /// Highlights `path` without navigating. Paths outside the current
    /// listing are ignored.
    pub fn select_entry(&mut self, path: &str) -> bool {
        let known = (!path.is_empty() && path == self.current_path)
            || self.entries.iter().any(|e| e.path == path);
        if known {
            self.selection = Some(path.to_string());
        }
        known
    }

    /// Goes to the parent directory; does nothing at a root.
    pub async fn up<L: DirectoryLister>(&mut self, lister: &L) -> &Self {
        if let Some(parent) = self.parent_path.clone() {
            self.navigate(lister, &parent).await;
        }
        self
    }

    /// The highlighted entry, else the current directory, else nothing.
    pub fn confirm(&self) -> Option<String> {
        self.selection.clone().or_else(|| {
            (!self.current_path.is_empty()).then(|| self.current_path.clone())
        })
    }
}

type PickCallback = Box<dyn FnOnce(String)>;

/// A browse dialog: state plus the lister it reads from and the callback that
/// receives the chosen folder.
pub struct FolderBrowser<L> {
    lister: L,
    state: FolderBrowserState,
    on_pick: Option<PickCallback>,
}

impl<L: DirectoryLister> FolderBrowser<L> {
    pub fn new(lister: L, on_pick: impl FnOnce(String) + 'static) -> Self {
        Self {
            lister,
            state: FolderBrowserState::new(),
            on_pick: Some(Box::new(on_pick)),
        }
    }

    pub fn state(&self) -> &FolderBrowserState {
        &self.state
    }

    pub async fn navigate(&mut self, path: &str) -> &FolderBrowserState {
        self.state.navigate(&self.lister, path).await
    }

    pub async fn up(&mut self) -> &FolderBrowserState {
        self.state.up(&self.lister).await
    }

    pub fn select_entry(&mut self, path: &str) -> bool {
        self.state.select_entry(path)
    }

    /// Hands the chosen folder to the callback, at most once. `None` means
    /// nothing was chosen and the callback is kept.
    pub fn confirm(&mut self) -> Option<String> {
        let picked = self.state.confirm()?;
        if let Some(on_pick) = self.on_pick.take() {
            on_pick(picked.clone());
        }
        Some(picked)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::protocol::DirListing;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    pub(crate) struct FakeLister {
        listings: HashMap<String, DirListing>,
    }

    impl FakeLister {
        pub(crate) fn with(mut self, current: &str, parent: Option<&str>, dirs: &[&str]) -> Self {
            let listing = DirListing {
                current: current.to_string(),
                parent: parent.map(str::to_string),
                dirs: dirs
                    .iter()
                    .map(|name| DirEntry {
                        name: name.to_string(),
                        path: format!("{}/{}", current.trim_end_matches('/'), name),
                    })
                    .collect(),
            };
            self.listings.insert(current.to_string(), listing);
            self
        }
    }

    impl DirectoryLister for FakeLister {
        async fn list_dirs(&self, path: &str) -> Result<DirListing, SessionError> {
            self.listings
                .get(path)
                .cloned()
                .ok_or_else(|| SessionError::io(path, "Not a directory"))
        }
    }

    fn tree() -> FakeLister {
        FakeLister::default()
            .with("/root", None, &["docs", "src"])
            .with("/root/docs", Some("/root"), &["drafts"])
    }

    #[tokio::test]
    async fn test_navigate_fills_state() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        state.navigate(&lister, "/root/docs").await;
        assert_eq!(state.current_path(), "/root/docs");
        assert_eq!(state.parent_path(), Some("/root"));
        assert_eq!(state.entries().len(), 1);
        assert_eq!(state.error(), None);
    }

    #[tokio::test]
    async fn test_up_at_root_is_noop() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        state.navigate(&lister, "/root").await;
        let before = state.clone();
        state.up(&lister).await;
        assert_eq!(state, before);
        assert_eq!(state.current_path(), "/root");
        assert!(!state.can_go_up());
    }

    #[tokio::test]
    async fn test_up_goes_to_parent() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        state.navigate(&lister, "/root/docs").await;
        state.up(&lister).await;
        assert_eq!(state.current_path(), "/root");
        assert_eq!(state.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_navigate_is_soft() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        state.navigate(&lister, "/root").await;
        state.select_entry("/root/src");

        state.navigate(&lister, "/nope").await;
        assert_eq!(state.current_path(), "/nope");
        assert!(state.entries().is_empty());
        assert!(state.error().unwrap().contains("Not a directory"));
        assert_eq!(state.selection(), None);
        assert!(!state.can_go_up());
    }

    #[tokio::test]
    async fn test_select_entry_keeps_invariant() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        state.navigate(&lister, "/root").await;

        assert!(state.select_entry("/root/src"));
        assert!(!state.select_entry("/elsewhere"));
        assert_eq!(state.selection(), Some("/root/src"));
        assert!(state.select_entry("/root"));
        assert_eq!(state.selection(), Some("/root"));
    }

    #[tokio::test]
    async fn test_confirm_prefers_selection() {
        let lister = tree();
        let mut state = FolderBrowserState::new();
        assert_eq!(state.confirm(), None);

        state.navigate(&lister, "/root").await;
        assert_eq!(state.confirm(), Some("/root".to_string()));

        state.select_entry("/root/docs");
        assert_eq!(state.confirm(), Some("/root/docs".to_string()));
    }

    #[tokio::test]
    async fn test_browser_callback_fires_once() {
        let picked = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&picked);
        let mut browser = FolderBrowser::new(tree(), move |path| sink.borrow_mut().push(path));

        assert_eq!(browser.confirm(), None);
        assert!(picked.borrow().is_empty());

        browser.navigate("/root").await;
        browser.select_entry("/root/src");
        assert_eq!(browser.confirm(), Some("/root/src".to_string()));
        assert_eq!(browser.confirm(), Some("/root/src".to_string()));
        assert_eq!(*picked.borrow(), vec!["/root/src".to_string()]);
    }
}
