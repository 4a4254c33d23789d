//! Project scripts: the `*.py` files in `<project>/scripts`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Result, SessionError};
use crate::protocol::ScriptOutput;

pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

#[cfg(windows)]
pub const DEFAULT_INTERPRETER: &str = "python";
#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER: &str = "python3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub path: PathBuf,
}

pub fn scripts_dir(root: &Path) -> PathBuf {
    root.join("scripts")
}

/// Scripts under `root`, sorted by file name. An empty list means the folder
/// exists but holds no scripts.
pub fn list_scripts(root: &Path) -> Result<Vec<ScriptEntry>> {
    let dir = scripts_dir(root);
    if !dir.is_dir() {
        return Err(SessionError::io(
            dir.to_string_lossy(),
            "No 'scripts' folder found",
        ));
    }

    let reader = std::fs::read_dir(&dir).map_err(|e| SessionError::io(dir.to_string_lossy(), e))?;
    let mut scripts: Vec<ScriptEntry> = reader
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "py"))
        .map(|path| ScriptEntry {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
        })
        .collect();
    scripts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scripts)
}

/// Runs `interpreter <script>` from the script's own folder.
///
/// Never fails: a missing script, a spawn failure or a timeout all come back
/// as `returncode = -1` with the reason in `stderr`. Dropping the future kills
/// the child.
pub async fn run_script(script: &Path, interpreter: &str, timeout: Duration) -> ScriptOutput {
    if !script.is_file() {
        return failed("Script not found".to_string());
    }

    let mut command = Command::new(interpreter);
    command
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = script.parent().filter(|d| !d.as_os_str().is_empty()) {
        command.current_dir(dir);
    }

    info!(script = %script.display(), %interpreter, "running script");
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => ScriptOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            returncode: output.status.code().unwrap_or(-1),
        },
        Ok(Err(e)) => {
            warn!(script = %script.display(), error = %e, "script failed to start");
            failed(e.to_string())
        }
        Err(_) => {
            warn!(script = %script.display(), "script timed out");
            failed(format!("Script timed out after {} seconds.", timeout.as_secs()))
        }
    }
}

fn failed(stderr: String) -> ScriptOutput {
    ScriptOutput {
        stdout: String::new(),
        stderr,
        returncode: -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        dir
    }

    #[test]
    fn test_list_scripts_sorted_py_only() {
        let dir = project();
        let scripts = dir.path().join("scripts");
        fs::write(scripts.join("wordcount.py"), "").unwrap();
        fs::write(scripts.join("export.py"), "").unwrap();
        fs::write(scripts.join("README.txt"), "").unwrap();
        fs::create_dir(scripts.join("lib.py")).unwrap();

        let names: Vec<_> = list_scripts(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["export.py", "wordcount.py"]);
    }

    #[test]
    fn test_missing_scripts_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_scripts(dir.path()).unwrap_err();
        assert!(err.to_string().contains("No 'scripts' folder found"));
    }

    #[tokio::test]
    async fn test_missing_script() {
        let output = run_script(Path::new("/no/such/script.py"), "sh", SCRIPT_TIMEOUT).await;
        assert_eq!(output.returncode, -1);
        assert_eq!(output.stderr, "Script not found");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_streams_and_code() {
        let dir = project();
        let script = dir.path().join("scripts").join("report.py");
        fs::write(&script, "pwd\necho oops >&2\nexit 3\n").unwrap();

        let output = run_script(&script, "sh", SCRIPT_TIMEOUT).await;
        assert!(output.stdout.trim_end().ends_with("scripts"));
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.returncode, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_reports_minus_one() {
        let dir = project();
        let script = dir.path().join("scripts").join("slow.py");
        fs::write(&script, "sleep 5\n").unwrap();

        let output = run_script(&script, "sh", Duration::from_millis(100)).await;
        assert_eq!(output.returncode, -1);
        assert!(output.stderr.starts_with("Script timed out after"));
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_interpreter() {
        let dir = project();
        let script = dir.path().join("scripts").join("a.py");
        fs::write(&script, "print('hi')\n").unwrap();

        let output = run_script(&script, "definitely-not-an-interpreter", SCRIPT_TIMEOUT).await;
        assert_eq!(output.returncode, -1);
        assert!(!output.stderr.is_empty());
    }
}
