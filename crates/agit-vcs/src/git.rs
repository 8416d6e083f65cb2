use crate::backend::{CommitInfo, Diff, VcsBackend, VcsError};
use bstr::ByteSlice;
use chrono::{TimeZone, Utc};
use gix::ObjectId;
use gix::diff::blob::intern::InternedInput;
use gix::diff::blob::sink::Counter;
use gix::diff::blob::sources::lines_with_terminator;
use gix::diff::blob::{Algorithm, UnifiedDiffBuilder};
use gix::objs::tree::{EntryKind as TreeEntryKind, EntryMode};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, instrument, warn};

/// Git backend rooted at a working tree.
///
/// Lookups go through `gix`; anything that mutates the index, the working
/// tree or a remote shells out to the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitBackend {
    root: PathBuf,
}

impl GitBackend {
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let repo = gix::discover(path).map_err(|_| VcsError::RepoNotFound)?;
        let root = repo
            .workdir()
            .ok_or_else(|| VcsError::BackendError {
                reason: "bare repository".to_string(),
            })?
            .to_path_buf();
        Ok(Self { root })
    }

    fn open_repo(&self) -> Result<gix::Repository, VcsError> {
        gix::open(&self.root).map_err(|_| VcsError::RepoNotFound)
    }

    fn is_clean(&self) -> Result<bool, VcsError> {
        Ok(self.changed_paths()?.is_empty())
    }

    fn git(&self, args: &[&str]) -> Result<Output, VcsError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|err| VcsError::BackendError {
                reason: format!("failed to run git {}: {err}", args.join(" ")),
            })
    }

    fn git_checked(&self, args: &[&str]) -> Result<Output, VcsError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(VcsError::BackendError {
                reason: format!("git {} failed: {}", args.join(" "), stderr_of(&output)),
            });
        }
        Ok(output)
    }

    fn git_capture(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.git_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn tracked_in_head(&self, path: &str) -> Result<bool, VcsError> {
        let spec = format!("HEAD:{path}");
        Ok(self.git(&["cat-file", "-e", &spec])?.status.success())
    }
}

impl VcsBackend for GitBackend {
    fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<String, VcsError> {
        let name = self.git_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(name.trim().to_string())
    }

    fn head_commit(&self) -> Result<String, VcsError> {
        let repo = self.open_repo()?;
        let commit = repo
            .head_commit()
            .map_err(map_backend_error("head commit"))?;
        Ok(commit.id.to_string())
    }

    fn branch_exists(&self, name: &str) -> Result<bool, VcsError> {
        let repo = self.open_repo()?;
        Ok(repo.find_reference(&ref_full_name(name)).is_ok())
    }

    fn branch_tip(&self, name: &str) -> Result<String, VcsError> {
        let repo = self.open_repo()?;
        let mut reference =
            repo.find_reference(&ref_full_name(name))
                .map_err(|_| VcsError::RefNotFound {
                    name: name.to_string(),
                })?;
        let target = reference
            .peel_to_id()
            .map_err(map_backend_error("peel ref"))?;
        Ok(target.to_string())
    }

    #[instrument(skip(self))]
    fn create_branch(&self, name: &str, start: Option<&str>) -> Result<(), VcsError> {
        if self.branch_exists(name)? {
            return Err(VcsError::RefAlreadyExists {
                name: name.to_string(),
            });
        }

        let mut args = vec!["branch", name];
        if let Some(start) = start {
            args.push(start);
        }
        let output = self.git(&args)?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("not a valid object name") || stderr.contains("unknown revision") {
                return Err(VcsError::RefNotFound {
                    name: start.unwrap_or("HEAD").to_string(),
                });
            }
            return Err(VcsError::BackendError {
                reason: format!("git branch failed: {stderr}"),
            });
        }
        debug!(branch = name, "created branch");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_branch(&self, name: &str) -> Result<(), VcsError> {
        if !self.branch_exists(name)? {
            return Err(VcsError::RefNotFound {
                name: name.to_string(),
            });
        }
        self.git_checked(&["branch", "-D", name])?;
        debug!(branch = name, "deleted branch");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<(), VcsError> {
        let output = self.git(&["push", remote, "--delete", name])?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("remote ref does not exist") {
                warn!(remote, branch = name, "remote branch already absent");
                return Ok(());
            }
            return Err(VcsError::PushRejected { reason: stderr });
        }
        Ok(())
    }

    fn remote_branch_exists(&self, remote: &str, name: &str) -> Result<bool, VcsError> {
        let pattern = ref_full_name(name);
        let output = self.git(&["ls-remote", "--exit-code", "--heads", remote, &pattern])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(2) => Ok(false),
            _ => Err(VcsError::SyncFailed {
                reason: format!("ls-remote {remote}: {}", stderr_of(&output)),
            }),
        }
    }

    #[instrument(skip(self))]
    fn checkout(&self, name: &str) -> Result<(), VcsError> {
        if !self.is_clean()? {
            return Err(VcsError::DirtyWorkingCopy);
        }

        let output = self.git(&["checkout", name])?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("did not match any")
                || stderr.contains("pathspec")
                || stderr.contains("not a valid object name")
            {
                return Err(VcsError::RefNotFound {
                    name: name.to_string(),
                });
            }
            return Err(VcsError::BackendError {
                reason: format!("git checkout failed: {stderr}"),
            });
        }
        debug!(branch = name, "checked out");
        Ok(())
    }

    #[instrument(skip(self))]
    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        let output = self.git(&["pull", "--ff-only", remote, branch])?;
        if !output.status.success() {
            return Err(VcsError::SyncFailed {
                reason: format!("pull {remote} {branch}: {}", stderr_of(&output)),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn rebase_onto(&self, target: &str) -> Result<(), VcsError> {
        if !self.is_clean()? {
            return Err(VcsError::DirtyWorkingCopy);
        }

        let output = self.git(&["rev-parse", "--verify", target])?;
        if !output.status.success() {
            return Err(VcsError::RefNotFound {
                name: target.to_string(),
            });
        }

        let output = self.git(&["rebase", target])?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stderr.contains("CONFLICT")
                || stdout.contains("CONFLICT")
                || stderr.contains("could not apply")
            {
                let _ = self.git(&["rebase", "--abort"]);
                warn!(target, "rebase aborted on conflict");
                return Err(VcsError::RebaseConflict {
                    target: target.to_string(),
                });
            }
            return Err(VcsError::BackendError {
                reason: format!("git rebase failed: {stderr}"),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        let output = self.git(&["push", "--set-upstream", remote, branch])?;
        if !output.status.success() {
            return Err(VcsError::PushRejected {
                reason: stderr_of(&output),
            });
        }
        debug!(remote, branch, "pushed");
        Ok(())
    }

    fn stage(&self, paths: &[&Path]) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Ok(());
        }
        let rel: Vec<String> = paths
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect();
        let mut args = vec!["add", "--force", "--"];
        args.extend(rel.iter().map(String::as_str));
        self.git_checked(&args)?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    fn commit(&self, message: &str, allow_empty: bool) -> Result<String, VcsError> {
        if !allow_empty && self.git(&["diff", "--cached", "--quiet"])?.status.success() {
            return Err(VcsError::NothingToCommit);
        }

        let mut args = vec!["commit", "--no-gpg-sign", "--quiet"];
        if allow_empty {
            args.push("--allow-empty");
        }
        args.extend(["-m", message]);
        let output = self.git(&args)?;
        if !output.status.success() {
            return Err(VcsError::BackendError {
                reason: format!("git commit failed: {}", stderr_of(&output)),
            });
        }

        let id = self.git_capture(&["rev-parse", "HEAD"])?.trim().to_string();
        debug!(commit = %id, "committed");
        Ok(id)
    }

    fn reset_soft(&self, target: &str) -> Result<(), VcsError> {
        self.git_checked(&["reset", "--soft", target])?;
        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<String>, VcsError> {
        let out = self.git_capture(&["status", "--porcelain=v1", "-uall"])?;
        Ok(out.lines().filter_map(parse_status_path).collect())
    }

    #[instrument(skip_all)]
    fn restore_paths(&self, paths: &[&Path]) -> Result<(), VcsError> {
        for path in paths {
            let rel = path.to_string_lossy();
            if self.tracked_in_head(&rel)? {
                self.git_checked(&["checkout", "HEAD", "--", &rel])?;
            } else {
                self.git_checked(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--", &rel])?;
                match std::fs::remove_file(self.root.join(path)) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(VcsError::BackendError {
                            reason: format!("remove {rel}: {err}"),
                        });
                    }
                }
            }
            debug!(path = %rel, "restored");
        }
        Ok(())
    }

    fn find_commit(&self, id: &str) -> Result<CommitInfo, VcsError> {
        let repo = self.open_repo()?;
        let object_id = ObjectId::from_hex(id.as_bytes()).map_err(|_| VcsError::CommitNotFound {
            id: id.to_string(),
        })?;
        let commit = repo
            .find_commit(object_id)
            .map_err(|_| VcsError::CommitNotFound { id: id.to_string() })?;
        commit_info(&commit)
    }

    fn log(&self, branch: &str, limit: Option<usize>) -> Result<Vec<CommitInfo>, VcsError> {
        let repo = self.open_repo()?;
        let tip = ObjectId::from_hex(self.branch_tip(branch)?.as_bytes())
            .map_err(map_backend_error("branch tip"))?;
        let commits = repo
            .rev_walk([tip])
            .all()
            .map_err(map_backend_error("rev walk"))?;

        let mut entries = Vec::new();
        for commit in commits.take(limit.unwrap_or(usize::MAX)) {
            let commit = commit.map_err(map_backend_error("walk commit"))?;
            let object = commit.object().map_err(map_backend_error("commit object"))?;
            entries.push(commit_info(&object)?);
        }
        Ok(entries)
    }

    fn diff_range(&self, base: &str, head: &str, path: Option<&str>) -> Result<Diff, VcsError> {
        let repo = self.open_repo()?;
        let base_id = ObjectId::from_hex(base.as_bytes()).map_err(|_| VcsError::CommitNotFound {
            id: base.to_string(),
        })?;
        let head_id = ObjectId::from_hex(head.as_bytes()).map_err(|_| VcsError::CommitNotFound {
            id: head.to_string(),
        })?;
        let base_tree = repo
            .find_commit(base_id)
            .map_err(|_| VcsError::CommitNotFound {
                id: base.to_string(),
            })?
            .tree()
            .map_err(map_backend_error("base tree"))?;
        let head_tree = repo
            .find_commit(head_id)
            .map_err(|_| VcsError::CommitNotFound {
                id: head.to_string(),
            })?
            .tree()
            .map_err(map_backend_error("head tree"))?;

        let changes = repo
            .diff_tree_to_tree(&base_tree, &head_tree, None)
            .map_err(map_backend_error("tree diff"))?;
        let wanted = |location: &str| path.is_none_or(|path| path == location);

        let mut output = String::new();
        for change in changes {
            match change {
                gix::object::tree::diff::ChangeDetached::Addition {
                    location,
                    entry_mode,
                    id,
                    ..
                } => {
                    let location = location.to_str_lossy();
                    if !is_blob_entry(entry_mode) || !wanted(&location) {
                        continue;
                    }
                    let new_text = blob_text(&repo, id)?;
                    append_unified_diff(&mut output, &location, &location, None, Some(&new_text))?;
                }
                gix::object::tree::diff::ChangeDetached::Deletion {
                    location,
                    entry_mode,
                    id,
                    ..
                } => {
                    let location = location.to_str_lossy();
                    if !is_blob_entry(entry_mode) || !wanted(&location) {
                        continue;
                    }
                    let old_text = blob_text(&repo, id)?;
                    append_unified_diff(&mut output, &location, &location, Some(&old_text), None)?;
                }
                gix::object::tree::diff::ChangeDetached::Modification {
                    location,
                    previous_entry_mode,
                    entry_mode,
                    previous_id,
                    id,
                    ..
                } => {
                    let location = location.to_str_lossy();
                    if !is_blob_entry(entry_mode)
                        || !is_blob_entry(previous_entry_mode)
                        || !wanted(&location)
                    {
                        continue;
                    }
                    let old_text = blob_text(&repo, previous_id)?;
                    let new_text = blob_text(&repo, id)?;
                    append_unified_diff(
                        &mut output,
                        &location,
                        &location,
                        Some(&old_text),
                        Some(&new_text),
                    )?;
                }
                gix::object::tree::diff::ChangeDetached::Rewrite {
                    source_location,
                    location,
                    source_entry_mode,
                    entry_mode,
                    source_id,
                    id,
                    ..
                } => {
                    let old_path = source_location.to_str_lossy();
                    let new_path = location.to_str_lossy();
                    if !is_blob_entry(entry_mode)
                        || !is_blob_entry(source_entry_mode)
                        || !(wanted(&old_path) || wanted(&new_path))
                    {
                        continue;
                    }
                    let old_text = blob_text(&repo, source_id)?;
                    let new_text = blob_text(&repo, id)?;
                    append_unified_diff(
                        &mut output,
                        &old_path,
                        &new_path,
                        Some(&old_text),
                        Some(&new_text),
                    )?;
                }
            }
        }

        Ok(Diff {
            base: base.to_string(),
            head: head.to_string(),
            unified: output,
        })
    }

    fn read_file(&self, rev: &str, path: &str) -> Result<Option<String>, VcsError> {
        let output = self.git(&["ls-tree", "--name-only", rev, "--", path])?;
        if !output.status.success() {
            return Err(VcsError::RefNotFound {
                name: rev.to_string(),
            });
        }
        if String::from_utf8_lossy(&output.stdout).trim().is_empty() {
            return Ok(None);
        }
        let spec = format!("{rev}:{path}");
        let content = self.git_capture(&["show", &spec])?;
        Ok(Some(content))
    }

    fn list_dir(&self, rev: &str, dir: &str) -> Result<Vec<String>, VcsError> {
        let dir = format!("{}/", dir.trim_end_matches('/'));
        let output = self.git(&["ls-tree", "--name-only", rev, "--", &dir])?;
        if !output.status.success() {
            return Err(VcsError::RefNotFound {
                name: rev.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

fn ref_full_name(name: &str) -> String {
    format!("refs/heads/{name}")
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn map_backend_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> VcsError {
    move |err| VcsError::BackendError {
        reason: format!("{context}: {err}"),
    }
}

fn commit_info(commit: &gix::Commit<'_>) -> Result<CommitInfo, VcsError> {
    let message = commit
        .message_raw()
        .map_err(map_backend_error("commit message"))?
        .to_str_lossy()
        .trim_end()
        .to_string();
    let time = commit.time().map_err(map_backend_error("commit time"))?;
    let timestamp = Utc
        .timestamp_opt(time.seconds, 0)
        .single()
        .ok_or_else(|| VcsError::BackendError {
            reason: format!("commit {} has an invalid timestamp", commit.id),
        })?;
    Ok(CommitInfo {
        id: commit.id.to_string(),
        parent_ids: commit.parent_ids().map(|id| id.to_string()).collect(),
        message,
        timestamp,
    })
}

fn parse_status_path(line: &str) -> Option<String> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Some(unquote(path.trim()));
    }
    if line.len() < 4 {
        return None;
    }
    let mut path = line[3..].trim();
    if let Some((_, renamed)) = path.split_once(" -> ") {
        path = renamed.trim();
    }
    Some(unquote(path))
}

fn unquote(path: &str) -> String {
    path.trim_matches('"').to_string()
}

fn is_blob_entry(mode: EntryMode) -> bool {
    matches!(
        TreeEntryKind::from(mode),
        TreeEntryKind::Blob | TreeEntryKind::BlobExecutable
    )
}

fn blob_text(repo: &gix::Repository, id: ObjectId) -> Result<String, VcsError> {
    let blob = repo.find_blob(id).map_err(map_backend_error("load blob"))?;
    Ok(String::from_utf8_lossy(&blob.data).to_string())
}

fn append_unified_diff(
    output: &mut String,
    old_path: &str,
    new_path: &str,
    old_text: Option<&str>,
    new_text: Option<&str>,
) -> Result<(), VcsError> {
    writeln!(output, "diff --git a/{old_path} b/{new_path}")
        .map_err(map_backend_error("write diff"))?;
    let left_header = if old_text.is_some() {
        format!("a/{old_path}")
    } else {
        "/dev/null".to_string()
    };
    let right_header = if new_text.is_some() {
        format!("b/{new_path}")
    } else {
        "/dev/null".to_string()
    };
    writeln!(output, "--- {left_header}").map_err(map_backend_error("write diff"))?;
    writeln!(output, "+++ {right_header}").map_err(map_backend_error("write diff"))?;

    let diff = diff_text(old_text, new_text);
    if !diff.wrapped.is_empty() {
        output.push_str(diff.wrapped.as_str());
        if !output.ends_with('\n') {
            output.push('\n');
        }
    }
    Ok(())
}

fn diff_text(old_text: Option<&str>, new_text: Option<&str>) -> Counter<String> {
    let input = InternedInput::new(
        lines_with_terminator(old_text.unwrap_or_default()),
        lines_with_terminator(new_text.unwrap_or_default()),
    );
    gix::diff::blob::diff(
        Algorithm::Histogram,
        &input,
        Counter::new(UnifiedDiffBuilder::new(&input)),
    )
}
