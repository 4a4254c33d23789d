//! Filesystem collaborators: file read/write for tabs and directory listing
//! for the folder browser.

use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::SessionError;
use crate::protocol::{DirEntry, DirListing, FileReadReply, SaveReply, SaveRequest};

/// Reads and writes whole files for tabs.
pub trait FileStore {
    fn read(&self, path: &str) -> FileReadReply;
    fn save(&self, request: SaveRequest) -> SaveReply;
    fn exists(&self, path: &str) -> bool;
}

/// Lists the subdirectories of one directory.
pub trait DirectoryLister {
    fn list_dirs(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<DirListing, SessionError>> + Send;
}

/// Local disk implementation of both collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl FileStore for LocalFiles {
    fn read(&self, path: &str) -> FileReadReply {
        if path.is_empty() || !Path::new(path).is_file() {
            return FileReadReply::Error {
                error: "File not found".to_string(),
            };
        }
        match fs::read(path) {
            Ok(bytes) => FileReadReply::Content {
                content: String::from_utf8_lossy(&bytes).into_owned(),
            },
            Err(e) => FileReadReply::Error {
                error: e.to_string(),
            },
        }
    }

    fn save(&self, request: SaveRequest) -> SaveReply {
        if request.path.is_empty() {
            return SaveReply {
                error: Some("No path provided".to_string()),
            };
        }
        let path = Path::new(&request.path);
        let result = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(path, request.content.as_bytes()));

        match result {
            Ok(()) => SaveReply::ok(),
            Err(e) => SaveReply {
                error: Some(e.to_string()),
            },
        }
    }

    fn exists(&self, path: &str) -> bool {
        !path.is_empty() && Path::new(path).exists()
    }
}

impl DirectoryLister for LocalFiles {
    async fn list_dirs(&self, path: &str) -> Result<DirListing, SessionError> {
        let target = path.trim();
        #[cfg(windows)]
        if target.is_empty() {
            return Ok(drive_roots());
        }
        let target = if target.is_empty() {
            home_dir()
        } else {
            target.to_string()
        };
        let target = target.as_str();

        let requested = PathBuf::from(target);
        let is_dir = tokio::fs::metadata(&requested)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(SessionError::io(target, "Not a directory"));
        }
        let current = tokio::fs::canonicalize(&requested)
            .await
            .map_err(|e| SessionError::io(target, e))?;

        let parent = current
            .parent()
            .filter(|parent| *parent != current)
            .map(|parent| parent.to_string_lossy().into_owned());

        let mut dirs = Vec::new();
        match tokio::fs::read_dir(&current).await {
            Ok(mut reader) => loop {
                let entry = match reader.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %current.display(), error = %e, "stopped reading directory");
                        break;
                    }
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                // Follows symlinks, like the tree view.
                let entry_path = entry.path();
                if tokio::fs::metadata(&entry_path).await.is_ok_and(|m| m.is_dir()) {
                    dirs.push(DirEntry {
                        name,
                        path: entry_path.to_string_lossy().into_owned(),
                    });
                }
            },
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %current.display(), "permission denied listing directory");
            }
            Err(e) => return Err(SessionError::io(target, e)),
        }
        dirs.sort_by_key(|d| d.name.to_lowercase());

        Ok(DirListing {
            current: current.to_string_lossy().into_owned(),
            parent,
            dirs,
        })
    }
}

/// Drive letters, listed when no path is given on Windows.
#[cfg(windows)]
fn drive_roots() -> DirListing {
    let dirs = ('A'..='Z')
        .map(|letter| format!("{letter}:\\"))
        .filter(|drive| Path::new(drive).is_dir())
        .map(|drive| DirEntry {
            name: drive.clone(),
            path: drive,
        })
        .collect();
    DirListing {
        current: String::new(),
        parent: None,
        dirs,
    }
}

fn home_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file() {
        let reply = LocalFiles.read("/definitely/not/here.md");
        assert_eq!(
            reply,
            FileReadReply::Error {
                error: "File not found".into()
            }
        );
    }

    #[test]
    fn test_save_creates_parents_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts").join("one.md");
        let path_str = path.to_string_lossy().into_owned();

        let reply = LocalFiles.save(SaveRequest {
            path: path_str.clone(),
            content: "It was a dark night.".into(),
        });
        assert_eq!(reply, SaveReply::ok());
        assert_eq!(
            LocalFiles.read(&path_str).into_result(&path_str).unwrap(),
            "It was a dark night."
        );
    }

    #[test]
    fn test_save_without_path() {
        let reply = LocalFiles.save(SaveRequest {
            path: String::new(),
            content: "x".into(),
        });
        assert!(reply.into_result("").is_err());
    }

    #[test]
    fn test_read_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.txt");
        fs::write(&path, [b'o', b'k', 0xff]).unwrap();
        let content = LocalFiles
            .read(&path.to_string_lossy())
            .into_result("bin.txt")
            .unwrap();
        assert!(content.starts_with("ok"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_list_dirs_sorted_without_hidden_or_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let listing = LocalFiles
            .list_dirs(&dir.path().to_string_lossy())
            .await
            .unwrap();
        let names: Vec<_> = listing.dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);

        let canonical = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(listing.current, canonical.to_string_lossy());
        assert_eq!(
            listing.parent.as_deref(),
            canonical.parent().map(|p| p.to_string_lossy().into_owned()).as_deref()
        );
    }

    #[tokio::test]
    async fn test_list_dirs_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "").unwrap();
        let err = LocalFiles.list_dirs(&file.to_string_lossy()).await.unwrap_err();
        assert!(err.to_string().contains("Not a directory"));
    }

    #[tokio::test]
    async fn test_empty_path_lists_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let Ok(listing) = LocalFiles.list_dirs("").await else {
            return;
        };
        let home = fs::canonicalize(home).unwrap();
        assert_eq!(listing.current, home.to_string_lossy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_root_has_no_parent() {
        let listing = LocalFiles.list_dirs("/").await.unwrap();
        assert_eq!(listing.current, "/");
        assert_eq!(listing.parent, None);
    }
}
