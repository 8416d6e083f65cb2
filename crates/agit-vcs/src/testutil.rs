use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Throwaway git repository on `main` with a committer identity configured.
pub struct GitTestRepo {
    dir: TempDir,
}

impl GitTestRepo {
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        git_in(dir.path(), &["init", "--quiet"])?;
        git_in(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        let repo = Self { dir };
        repo.configure()?;
        Ok(repo)
    }

    /// Bare origin plus a clone with one pushed commit on `main`.
    pub fn with_origin() -> io::Result<(TempDir, Self)> {
        let origin = TempDir::new()?;
        git_in(origin.path(), &["init", "--bare", "--quiet"])?;
        git_in(origin.path(), &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        let repo = Self::new()?;
        repo.commit("initial commit")?;
        let url = origin.path().to_string_lossy().to_string();
        repo.git(&["remote", "add", "origin", &url])?;
        repo.git(&["push", "--quiet", "-u", "origin", "main"])?;
        Ok((origin, repo))
    }

    pub fn clone_from(origin: &Path) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let url = origin.to_string_lossy().to_string();
        git_in(dir.path(), &["clone", "--quiet", &url, "."])?;
        let repo = Self { dir };
        repo.configure()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel: &str, content: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read_file(&self, rel: &str) -> io::Result<String> {
        std::fs::read_to_string(self.dir.path().join(rel))
    }

    pub fn commit(&self, message: &str) -> io::Result<String> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "--quiet", "--allow-empty", "--no-gpg-sign", "-m", message])?;
        Ok(self.git(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn git(&self, args: &[&str]) -> io::Result<String> {
        git_in(self.dir.path(), args)
    }

    fn configure(&self) -> io::Result<()> {
        self.git(&["config", "user.email", "test@example.com"])?;
        self.git(&["config", "user.name", "Test User"])?;
        self.git(&["config", "commit.gpgsign", "false"])?;
        Ok(())
    }
}

fn git_in(dir: &Path, args: &[&str]) -> io::Result<String> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
