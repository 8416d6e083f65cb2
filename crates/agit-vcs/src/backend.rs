use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub base: String,
    pub head: String,
    pub unified: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub parent_ids: Vec<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("repo not found")]
    RepoNotFound,
    #[error("dirty working copy")]
    DirtyWorkingCopy,
    #[error("ref already exists: {name}")]
    RefAlreadyExists { name: String },
    #[error("ref not found: {name}")]
    RefNotFound { name: String },
    #[error("commit not found: {id}")]
    CommitNotFound { id: String },
    #[error("nothing to commit")]
    NothingToCommit,
    #[error("sync with remote failed: {reason}")]
    SyncFailed { reason: String },
    #[error("rebase onto {target} stopped on a conflict")]
    RebaseConflict { target: String },
    #[error("push rejected: {reason}")]
    PushRejected { reason: String },
    #[error("backend error: {reason}")]
    BackendError { reason: String },
}

/// Primitive operations over one shared working tree.
///
/// Every method acts on the same checkout, so callers are responsible for
/// serializing sequences such as checkout, stage and commit.
pub trait VcsBackend: Send + Sync {
    fn root(&self) -> &Path;

    fn current_branch(&self) -> Result<String, VcsError>;
    fn head_commit(&self) -> Result<String, VcsError>;
    fn branch_exists(&self, name: &str) -> Result<bool, VcsError>;
    fn branch_tip(&self, name: &str) -> Result<String, VcsError>;
    fn create_branch(&self, name: &str, start: Option<&str>) -> Result<(), VcsError>;
    fn delete_branch(&self, name: &str) -> Result<(), VcsError>;
    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<(), VcsError>;
    fn remote_branch_exists(&self, remote: &str, name: &str) -> Result<bool, VcsError>;

    fn checkout(&self, name: &str) -> Result<(), VcsError>;
    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), VcsError>;
    fn rebase_onto(&self, target: &str) -> Result<(), VcsError>;
    fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    fn stage(&self, paths: &[&Path]) -> Result<(), VcsError>;
    fn commit(&self, message: &str, allow_empty: bool) -> Result<String, VcsError>;
    fn reset_soft(&self, target: &str) -> Result<(), VcsError>;
    fn changed_paths(&self) -> Result<Vec<String>, VcsError>;
    fn restore_paths(&self, paths: &[&Path]) -> Result<(), VcsError>;

    fn find_commit(&self, id: &str) -> Result<CommitInfo, VcsError>;
    fn log(&self, branch: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>, VcsError>;
    fn diff_range(&self, base: &str, head: &str, path: Option<&str>) -> Result<Diff, VcsError>;
    fn read_file(&self, rev: &str, path: &str) -> Result<Option<String>, VcsError>;
    fn list_dir(&self, rev: &str, dir: &str) -> Result<Vec<String>, VcsError>;
}
