//! Request/response shapes exchanged with the outside world.
//!
//! These mirror the JSON bodies of the chat, file, browse and script calls.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Response { response: String },
    Error { error: String },
}

impl ChatReply {
    /// A structured error reply becomes [`SessionError::Server`].
    pub fn into_result(self) -> Result<String, SessionError> {
        match self {
            ChatReply::Response { response } => Ok(response),
            ChatReply::Error { error } => Err(SessionError::Server(error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileReadReply {
    Content { content: String },
    Error { error: String },
}

impl FileReadReply {
    pub fn into_result(self, path: &str) -> Result<String, SessionError> {
        match self {
            FileReadReply::Content { content } => Ok(content),
            FileReadReply::Error { error } => Err(SessionError::io(path, error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveReply {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn into_result(self, path: &str) -> Result<(), SessionError> {
        match self.error {
            None => Ok(()),
            Some(error) => Err(SessionError::io(path, error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
}

/// One level of a directory, subdirectories only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirListing {
    pub current: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub dirs: Vec<DirEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

impl ScriptOutput {
    /// Text shown in the script output window, tuple rendered as-is.
    pub fn render(&self) -> String {
        let mut text = String::new();
        if !self.stdout.is_empty() {
            text.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            text.push_str("\n--- stderr ---\n");
            text.push_str(&self.stderr);
        }
        text.push_str(&format!("\n\nExit code: {}", self.returncode));
        text
    }
}
