use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::BaselineError;
use crate::source::{truncate_chars, MAX_FILE_CHARS};

/// Transient access to document content at a baseline. Nothing is cached to
/// disk; content is fetched per run and dropped with it.
pub trait BaselineSource {
    /// Resolve a ref to a stable identifier. Failing here is fatal only
    /// because the caller explicitly asked for baseline mode.
    fn resolve(&self, git_ref: &str) -> Result<String, BaselineError>;

    /// Content of `path` at `git_ref`, or `None` when the file does not
    /// exist there. Absence is an expected answer, not an error.
    fn read(&self, git_ref: &str, path: &str) -> Option<String>;
}

/// Baseline source backed by the local git repository.
#[derive(Debug, Clone, Default)]
pub struct GitBaselineSource {
    pub workdir: Option<PathBuf>,
}

impl GitBaselineSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn git(&self) -> Command {
        let mut command = Command::new("git");
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }
        command
    }
}

impl BaselineSource for GitBaselineSource {
    fn resolve(&self, git_ref: &str) -> Result<String, BaselineError> {
        let inside = self
            .git()
            .args(["rev-parse", "--is-inside-work-tree"])
            .output()
            .map_err(|err| BaselineError::RefNotResolvable {
                git_ref: git_ref.to_string(),
                detail: err.to_string(),
            })?;
        if !inside.status.success() {
            return Err(BaselineError::NotARepository);
        }

        let output = self
            .git()
            .args(["rev-parse", git_ref])
            .output()
            .map_err(|err| BaselineError::RefNotResolvable {
                git_ref: git_ref.to_string(),
                detail: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(BaselineError::RefNotResolvable {
                git_ref: git_ref.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(%git_ref, %commit, "baseline ref resolved");
        Ok(commit)
    }

    fn read(&self, git_ref: &str, path: &str) -> Option<String> {
        let output = self
            .git()
            .args(["show", &format!("{git_ref}:{path}")])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let content = String::from_utf8_lossy(&output.stdout).into_owned();
        Some(truncate_chars(&content, MAX_FILE_CHARS))
    }
}
