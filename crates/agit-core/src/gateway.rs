use crate::config::Settings;
use crate::error::{AgitError, ThreadError};
use agit_vcs::VcsBackend;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
struct Branches {
    remote: String,
    default: String,
    working: String,
}

/// Sole owner of the shared working tree.
///
/// Mutating operations hold the write lock from the first sync through the
/// final push; queries take the read lock and never move `HEAD`.
pub struct Gateway<B: VcsBackend> {
    backend: RwLock<B>,
    branches: Branches,
}

impl<B: VcsBackend> Gateway<B> {
    pub fn new(backend: B, settings: &Settings) -> Self {
        Self {
            backend: RwLock::new(backend),
            branches: Branches {
                remote: settings.remote.clone(),
                default: settings.default_branch.clone(),
                working: settings.working_branch.clone(),
            },
        }
    }

    pub fn working_branch(&self) -> &str {
        &self.branches.working
    }

    pub fn write<T, F>(&self, f: F) -> Result<T, AgitError>
    where
        F: FnOnce(&mut WriteSession<'_, B>) -> Result<T, AgitError>,
    {
        let guard = self
            .backend
            .write()
            .map_err(|_| AgitError::internal("repository lock poisoned"))?;
        let mut session = WriteSession {
            backend: &*guard,
            branches: &self.branches,
            written: Vec::new(),
        };
        let result = f(&mut session);
        if result.is_err() {
            session.discard_writes();
        }
        result
    }

    pub fn read<T, F>(&self, f: F) -> Result<T, AgitError>
    where
        F: FnOnce(&B) -> Result<T, AgitError>,
    {
        let guard = self
            .backend
            .read()
            .map_err(|_| AgitError::internal("repository lock poisoned"))?;
        f(&*guard)
    }
}

/// One mutating operation's view of the repository.
///
/// Paths written through the session are restored if the operation fails
/// before they are committed.
pub struct WriteSession<'a, B: VcsBackend> {
    backend: &'a B,
    branches: &'a Branches,
    written: Vec<PathBuf>,
}

impl<B: VcsBackend> WriteSession<'_, B> {
    pub fn backend(&self) -> &B {
        self.backend
    }

    pub fn root(&self) -> &Path {
        self.backend.root()
    }

    pub fn working_branch(&self) -> &str {
        &self.branches.working
    }

    #[instrument(skip(self))]
    pub fn sync_to_main(&self) -> Result<(), AgitError> {
        let Branches {
            remote, default, ..
        } = self.branches;
        self.backend.checkout(default)?;
        if self.backend.remote_branch_exists(remote, default)? {
            self.backend.pull_ff_only(remote, default)?;
        }
        Ok(())
    }

    /// Leaves the working branch checked out, current with its remote and
    /// rebased onto the default branch.
    #[instrument(skip(self))]
    pub fn checkout_working_branch(&self) -> Result<(), AgitError> {
        self.sync_to_main()?;
        let Branches {
            remote,
            default,
            working,
        } = self.branches;
        if !self.backend.branch_exists(working)? {
            debug!(branch = %working, "creating working branch");
            self.backend.create_branch(working, Some(default))?;
        }
        self.backend.checkout(working)?;
        if self.backend.remote_branch_exists(remote, working)? {
            self.backend.pull_ff_only(remote, working)?;
        }
        self.backend.rebase_onto(default)?;
        Ok(())
    }

    pub fn checkout_thread(&self, thread_id: &str, branch: &str) -> Result<(), AgitError> {
        if !self.backend.branch_exists(branch)? {
            return Err(ThreadError::NotFound {
                id: thread_id.to_string(),
            }
            .into());
        }
        self.backend.checkout(branch)?;
        let remote = &self.branches.remote;
        if self.backend.remote_branch_exists(remote, branch)? {
            self.backend.pull_ff_only(remote, branch)?;
        }
        Ok(())
    }

    pub fn create_branch(&self, name: &str, start: Option<&str>) -> Result<(), AgitError> {
        self.backend.create_branch(name, start)?;
        Ok(())
    }

    pub fn checkout(&self, name: &str) -> Result<(), AgitError> {
        self.backend.checkout(name)?;
        Ok(())
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).is_file()
    }

    pub fn read_to_string(&self, rel: &str) -> Result<Option<String>, AgitError> {
        match std::fs::read_to_string(self.root().join(rel)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AgitError::internal(format!("read {rel}: {err}"))),
        }
    }

    pub fn write_file(&mut self, rel: &str, content: &str) -> Result<(), AgitError> {
        self.modify_file(rel, |path| std::fs::write(path, content))
    }

    pub fn remove_file(&mut self, rel: &str) -> Result<(), AgitError> {
        self.modify_file(rel, |path| match std::fs::remove_file(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        })
    }

    /// Runs `edit` on the absolute path of `rel`, tracking it for rollback.
    pub fn modify_file<F>(&mut self, rel: &str, edit: F) -> Result<(), AgitError>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| AgitError::internal(format!("create {}: {err}", parent.display())))?;
        }
        let rel_path = PathBuf::from(rel);
        if !self.written.contains(&rel_path) {
            self.written.push(rel_path);
        }
        edit(&path).map_err(|err| AgitError::internal(format!("write {rel}: {err}")))
    }

    /// Stages exactly `paths`, ignored or not, and commits them.
    #[instrument(skip(self, paths))]
    pub fn stage_and_commit(&mut self, paths: &[&str], message: &str) -> Result<String, AgitError> {
        let paths: Vec<&Path> = paths.iter().map(Path::new).collect();
        self.backend.stage(&paths)?;
        let commit = self.backend.commit(message, false)?;
        self.written.clear();
        debug!(commit = %commit, "committed");
        Ok(commit)
    }

    pub fn commit_marker(&mut self, message: &str) -> Result<String, AgitError> {
        let commit = self.backend.commit(message, true)?;
        self.written.clear();
        Ok(commit)
    }

    pub fn push(&self, branch: &str) -> Result<(), AgitError> {
        self.backend.push(&self.branches.remote, branch)?;
        Ok(())
    }

    pub fn delete_remote_branch(&self, branch: &str) -> Result<(), AgitError> {
        self.backend
            .delete_remote_branch(&self.branches.remote, branch)?;
        Ok(())
    }

    /// Moves `HEAD` back to `base` and discards everything changed since.
    pub fn discard_to(&mut self, base: &str) -> Result<(), AgitError> {
        self.backend.reset_soft(base)?;
        let changed = self.backend.changed_paths()?;
        let paths: Vec<&Path> = changed.iter().map(Path::new).collect();
        self.backend.restore_paths(&paths)?;
        self.written.clear();
        Ok(())
    }

    /// Puts `paths` back to their `HEAD` state; paths `HEAD` lacks are removed.
    pub fn restore(&mut self, paths: &[String]) -> Result<(), AgitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let rel: Vec<&Path> = paths.iter().map(Path::new).collect();
        self.backend.restore_paths(&rel)?;
        self.written.retain(|path| !rel.contains(&path.as_path()));
        Ok(())
    }

    /// Restores every path written since the last commit.
    pub fn discard_writes(&mut self) {
        if self.written.is_empty() {
            return;
        }
        let paths: Vec<&Path> = self.written.iter().map(PathBuf::as_path).collect();
        match self.backend.restore_paths(&paths) {
            Ok(()) => warn!(paths = ?self.written, "rolled back uncommitted writes"),
            Err(err) => warn!(error = %err, paths = ?self.written, "rollback failed"),
        }
        self.written.clear();
    }
}
