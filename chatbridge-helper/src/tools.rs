//! External tool resolution and invocation
//!
//! Tools are located by checking well-known install paths first and then a
//! fixed list of search directories. The resolved absolute path is executed
//! directly with an argument vector; nothing is ever passed through a shell.

use chatbridge_common::validate_tool_name;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Directories searched after the well-known candidates, before `$PATH`
pub const EXTRA_SEARCH_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// Errors from locating or running an external tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{name} not found - {hint}")]
    NotFound { name: String, hint: String },

    #[error("Refusing to look up tool '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Failed to start {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} did not finish within {}s", .path.display(), .timeout.as_secs())]
    Timeout { path: PathBuf, timeout: Duration },
}

/// Description of an external tool and where it is usually installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Bare executable name, used for the search-path fallback
    pub name: String,
    /// Display name used in the not-found message
    pub display_name: String,
    /// Absolute paths checked first, in priority order (`~/` is expanded)
    pub candidates: Vec<String>,
    /// Installation hint shown when the tool is missing
    pub install_hint: String,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            candidates: Vec::new(),
            install_hint: String::new(),
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn candidate(mut self, path: impl Into<String>) -> Self {
        self.candidates.push(path.into());
        self
    }

    pub fn install_hint(mut self, hint: impl Into<String>) -> Self {
        self.install_hint = hint.into();
        self
    }

    /// Android Debug Bridge
    pub fn adb() -> Self {
        Self::new("adb")
            .display_name("ADB")
            .candidate("/opt/homebrew/bin/adb")
            .candidate("/usr/local/bin/adb")
            .candidate("/usr/bin/adb")
            .candidate("~/Library/Android/sdk/platform-tools/adb")
            .candidate("~/Android/Sdk/platform-tools/adb")
            .install_hint("Please install Android Platform Tools")
    }

    /// libimobiledevice device query tool
    pub fn ideviceinfo() -> Self {
        Self::new("ideviceinfo")
            .display_name("libimobiledevice")
            .candidate("/opt/homebrew/bin/ideviceinfo")
            .candidate("/usr/local/bin/ideviceinfo")
            .candidate("/usr/bin/ideviceinfo")
            .install_hint("Please install via Homebrew")
    }

    /// libimobiledevice backup/restore tool
    pub fn idevicebackup2() -> Self {
        Self::new("idevicebackup2")
            .display_name("idevicebackup2")
            .candidate("/opt/homebrew/bin/idevicebackup2")
            .candidate("/usr/local/bin/idevicebackup2")
            .candidate("/usr/bin/idevicebackup2")
            .install_hint("Please install libimobiledevice")
    }

    pub fn not_found(&self) -> ToolError {
        ToolError::NotFound {
            name: self.display_name.clone(),
            hint: self.install_hint.clone(),
        }
    }
}

/// Resolves [`ToolSpec`]s to absolute executable paths
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_dirs: Vec<PathBuf>,
    home: Option<PathBuf>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ToolLocator {
    /// Search the extra directories followed by the entries of `$PATH`
    pub fn from_env() -> Self {
        let mut search_dirs: Vec<PathBuf> = EXTRA_SEARCH_DIRS.iter().map(PathBuf::from).collect();

        if let Some(path) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path) {
                // Relative PATH entries depend on the working directory
                if dir.is_absolute() && !search_dirs.contains(&dir) {
                    search_dirs.push(dir);
                }
            }
        }

        Self {
            search_dirs,
            home: dirs::home_dir(),
        }
    }

    /// Search only the given directories
    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            home: dirs::home_dir(),
        }
    }

    /// Find an executable for `spec`
    pub fn resolve(&self, spec: &ToolSpec) -> Result<PathBuf, ToolError> {
        for candidate in &spec.candidates {
            if let Some(path) = self.expand(candidate) {
                if is_executable(&path) {
                    return Ok(path);
                }
            }
        }

        validate_tool_name(&spec.name).map_err(|reason| ToolError::InvalidName {
            name: spec.name.clone(),
            reason,
        })?;

        self.search_dirs
            .iter()
            .map(|dir| dir.join(&spec.name))
            .find(|path| is_executable(path))
            .ok_or_else(|| spec.not_found())
    }

    /// [`resolve`](Self::resolve) on the blocking pool, for async callers
    pub async fn locate(&self, spec: &ToolSpec) -> Result<PathBuf, ToolError> {
        let locator = self.clone();
        let lookup = spec.clone();

        match tokio::task::spawn_blocking(move || locator.resolve(&lookup)).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Lookup of {} did not complete: {}", spec.name, e);
                Err(spec.not_found())
            }
        }
    }

    fn expand(&self, candidate: &str) -> Option<PathBuf> {
        match candidate.strip_prefix("~/") {
            Some(rest) => self.home.as_ref().map(|home| home.join(rest)),
            None => Some(PathBuf::from(candidate)),
        }
    }
}

/// Whether `path` is a regular file the current user may execute
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };

    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Captured result of a finished tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout and stderr joined, for diagnostics
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();

        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => match self.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            },
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Run `path` with a fixed argument list and wait at most `timeout`
///
/// The child is killed if the timeout elapses.
pub async fn run_tool<S>(path: &Path, args: &[S], timeout: Duration) -> Result<ToolOutput, ToolError>
where
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ToolError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            path: path.to_path_buf(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::Timeout {
                path: path.to_path_buf(),
                timeout,
            });
        }
    };

    Ok(ToolOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
