pub mod ai;
pub mod browser;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod files;
pub mod mention;
pub mod protocol;
pub mod scripts;
pub mod session;
pub mod state;
pub mod tabs;
pub mod tree;

// Re-export main types for convenience
pub use ai::{CompletionEndpoint, LlamaCppClient};
pub use browser::{FolderBrowser, FolderBrowserState};
pub use chat::{ChatSessionController, ChatState};
pub use config::{Config, ConfigStore};
pub use context::{ContextChange, ContextSet};
pub use error::SessionError;
pub use files::{DirectoryLister, FileStore, LocalFiles};
pub use session::Session;
pub use state::{ChatMessage, ChatRole};
pub use tabs::{EditorBuffer, SaveOutcome, Tab, TabManager};
