use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4830;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repo_path: PathBuf,
    pub remote: String,
    pub default_branch: String,
    pub working_branch: String,
    pub thread_prefix: String,
    pub config_dir: String,
    pub base_config: String,
    /// Explicit registry path. When unset, the base config's
    /// `model-settings-file` key is consulted before the built-in default.
    pub model_settings_file: Option<String>,
    pub agent_command: Option<String>,
    pub agent_timeout_secs: u64,
    pub bind: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            remote: "origin".to_string(),
            default_branch: "main".to_string(),
            working_branch: "aider-main".to_string(),
            thread_prefix: "aider".to_string(),
            config_dir: ".aider".to_string(),
            base_config: ".aider.conf.yml".to_string(),
            model_settings_file: None,
            agent_command: None,
            agent_timeout_secs: 900,
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    remote: Option<String>,
    default_branch: Option<String>,
    working_branch: Option<String>,
    thread_prefix: Option<String>,
    config_dir: Option<String>,
    base_config: Option<String>,
    model_settings_file: Option<String>,
    agent: Option<AgentSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentSection {
    command: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    bind: Option<String>,
    port: Option<u16>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Defaults, then the optional TOML file, then environment overrides.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(repo) = non_empty(env("AGIT_REPO_PATH")) {
            settings.repo_path = PathBuf::from(repo);
        }

        let config_path = non_empty(env("AGIT_CONFIG"))
            .map_or_else(|| settings.repo_path.join(".agit.toml"), PathBuf::from);
        if let Some(file) = read_file_config(&config_path)? {
            settings.apply_file(file);
        }

        settings.apply_env(&env)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn assistants_dir(&self) -> String {
        format!("{}/assistants", self.config_dir)
    }

    pub fn instructions_dir(&self) -> String {
        format!("{}/instructions", self.config_dir)
    }

    pub fn threads_dir(&self) -> String {
        format!("{}/threads", self.config_dir)
    }

    fn apply_file(&mut self, file: FileConfig) {
        let FileConfig {
            remote,
            default_branch,
            working_branch,
            thread_prefix,
            config_dir,
            base_config,
            model_settings_file,
            agent,
            server,
        } = file;

        set_if_some(&mut self.remote, remote);
        set_if_some(&mut self.default_branch, default_branch);
        set_if_some(&mut self.working_branch, working_branch);
        set_if_some(&mut self.thread_prefix, thread_prefix);
        set_if_some(&mut self.config_dir, config_dir);
        set_if_some(&mut self.base_config, base_config);
        if model_settings_file.is_some() {
            self.model_settings_file = model_settings_file;
        }
        if let Some(agent) = agent {
            if agent.command.is_some() {
                self.agent_command = agent.command;
            }
            set_if_some(&mut self.agent_timeout_secs, agent.timeout_secs);
        }
        if let Some(server) = server {
            set_if_some(&mut self.bind, server.bind);
            set_if_some(&mut self.port, server.port);
        }
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        set_if_some(&mut self.remote, non_empty(env("AGIT_REMOTE")));
        set_if_some(&mut self.default_branch, non_empty(env("DEFAULT_BRANCH")));
        set_if_some(&mut self.working_branch, non_empty(env("AIDER_MAIN_BRANCH")));
        set_if_some(&mut self.thread_prefix, non_empty(env("AGIT_THREAD_PREFIX")));
        set_if_some(&mut self.config_dir, non_empty(env("AGIT_CONFIG_DIR")));
        set_if_some(&mut self.base_config, non_empty(env("AIDER_CONFIG_PATH")));
        if let Some(path) = non_empty(env("AIDER_MODEL_SETTINGS_FILE")) {
            self.model_settings_file = Some(path);
        }
        if let Some(command) = non_empty(env("AGIT_AGENT_COMMAND")) {
            self.agent_command = Some(command);
        }
        if let Some(value) = non_empty(env("AGIT_AGENT_TIMEOUT_SECS")) {
            self.agent_timeout_secs = parse_number("AGIT_AGENT_TIMEOUT_SECS", &value)?;
        }
        set_if_some(&mut self.bind, non_empty(env("AGIT_BIND")));
        if let Some(value) = non_empty(env("AGIT_PORT")) {
            self.port = parse_number("AGIT_PORT", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let working = format!("{}/", self.working_branch);
        let threads = format!("{}/", self.thread_prefix);
        if self.working_branch == self.thread_prefix
            || self.thread_prefix.starts_with(&working)
            || self.working_branch.starts_with(&threads)
        {
            return Err(ConfigError::Invalid {
                key: "AIDER_MAIN_BRANCH".to_string(),
                message: format!(
                    "working branch {} collides with thread prefix {}",
                    self.working_branch, self.thread_prefix
                ),
            });
        }
        if self.thread_prefix.is_empty() || self.thread_prefix.ends_with('/') {
            return Err(ConfigError::Invalid {
                key: "AGIT_THREAD_PREFIX".to_string(),
                message: "must be a non-empty ref component".to_string(),
            });
        }
        if self.agent_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AGIT_AGENT_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn read_file_config(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };
    let parsed = toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(Some(parsed))
}

fn set_if_some<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: err.to_string(),
    })
}
