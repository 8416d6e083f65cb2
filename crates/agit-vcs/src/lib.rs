pub mod backend;
pub mod git;

#[cfg(test)]
pub(crate) mod testutil;

pub use backend::{CommitInfo, Diff, VcsBackend, VcsError};
pub use git::GitBackend;
