#![allow(dead_code)]

use agit_core::error::AgentError;
use agit_core::types::CreateAssistantRequest;
use agit_core::{Agent, AgentOutcome, AgentRequest, Agit, Settings};
use agit_vcs::GitBackend;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn git_ok(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
        .status
        .success()
}

/// A bare origin seeded with one commit on `main`, and a clone to serve from.
pub struct Fixture {
    pub origin: TempDir,
    pub clone: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_files(&[("README.md", "# demo\n")])
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let origin = TempDir::new().unwrap();
        git(origin.path(), &["init", "--bare", "--quiet"]);
        git(origin.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let seed = TempDir::new().unwrap();
        git(seed.path(), &["init", "--quiet"]);
        git(seed.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        configure_user(seed.path());
        for (rel, content) in files {
            let path = seed.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        git(seed.path(), &["add", "-A"]);
        git(seed.path(), &["commit", "--quiet", "-m", "initial"]);
        let origin_path = origin.path().to_str().unwrap();
        git(seed.path(), &["remote", "add", "origin", origin_path]);
        git(seed.path(), &["push", "--quiet", "origin", "main"]);

        let clone = TempDir::new().unwrap();
        git(clone.path(), &["clone", "--quiet", origin_path, "."]);
        configure_user(clone.path());

        Self { origin, clone }
    }

    pub fn path(&self) -> &Path {
        self.clone.path()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            repo_path: self.path().to_path_buf(),
            ..Settings::default()
        }
    }

    pub fn agit(&self, agent: ScriptedAgent) -> Agit<GitBackend> {
        let backend = GitBackend::open(self.path()).unwrap();
        Agit::new(backend, &self.settings()).with_agent(agent)
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(self.path(), args)
    }

    /// Tip of `branch` as the origin sees it.
    pub fn origin_tip(&self, branch: &str) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(self.origin.path())
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn show(&self, rev: &str, path: &str) -> String {
        self.git(&["show", &format!("{rev}:{path}")])
    }
}

fn configure_user(dir: &Path) {
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

pub fn assistant_request(name: &str, model: &str) -> CreateAssistantRequest {
    CreateAssistantRequest {
        name: Some(name.to_string()),
        model: Some(model.to_string()),
        ..CreateAssistantRequest::default()
    }
}

/// Stands in for the real agent: writes files, appends a reply to the
/// history, and optionally commits its own work.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    pub edits: Vec<(String, String)>,
    pub reply: Option<String>,
    pub exit_code: i32,
    pub commit_own_work: bool,
    pub fail_with_error: bool,
}

impl ScriptedAgent {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn editing(path: &str, content: &str, reply: &str) -> Self {
        Self {
            edits: vec![(path.to_string(), content.to_string())],
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest<'_>) -> Result<AgentOutcome, AgentError> {
        if !request.workdir.join(request.config_file).is_file() {
            return Err(AgentError::Spawn {
                message: format!("missing config {}", request.config_file),
            });
        }
        for (rel, content) in &self.edits {
            let path = request.workdir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        if self.fail_with_error {
            return Err(AgentError::Spawn {
                message: "scripted failure".to_string(),
            });
        }
        if let Some(reply) = &self.reply {
            let history = request.workdir.join(request.history_file);
            let mut text = std::fs::read_to_string(&history).unwrap_or_default();
            text.push_str(&format!("\n{reply}\n"));
            std::fs::write(history, text).unwrap();
        }
        if self.commit_own_work {
            git(request.workdir, &["add", "-A"]);
            git(request.workdir, &["commit", "--quiet", "-m", "agent edit"]);
        }
        Ok(AgentOutcome {
            exit_code: Some(self.exit_code),
            stdout: format!("prompt: {}", request.prompt),
            stderr: String::new(),
        })
    }
}
