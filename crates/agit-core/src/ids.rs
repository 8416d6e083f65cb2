use crate::config::Settings;
use crate::error::{RequestError, ThreadError};
use std::fmt;

/// Assistant identity: the name it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssistantName(String);

/// Thread identity: the branch name with the namespace prefix removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadName(String);

impl AssistantName {
    pub fn parse(value: &str) -> Result<Self, RequestError> {
        validate_name("name", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ThreadName {
    /// Strips one leading `<prefix>/` so already-namespaced ids resolve to the
    /// same thread.
    pub fn parse(value: &str, prefix: &str) -> Result<Self, RequestError> {
        let stripped = value
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(value);
        validate_name("thread_id", stripped)?;
        Ok(Self(stripped.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssistantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_name(field: &'static str, value: &str) -> Result<(), RequestError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(RequestError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

/// Full 40-hex commit id, as produced for messages and runs.
pub fn is_commit_id(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|ch| ch.is_ascii_hexdigit())
}

/// Steps are addressed by their zero-based ordinal within a run's diff.
pub fn parse_step_id(run_id: &str, step_id: &str) -> Result<usize, ThreadError> {
    step_id.parse().map_err(|_| ThreadError::StepNotFound {
        run_id: run_id.to_string(),
        step_id: step_id.to_string(),
    })
}

/// Maps API identifiers onto repository paths and branch names.
#[derive(Debug, Clone)]
pub struct Layout {
    config_dir: String,
    thread_prefix: String,
    base_config: String,
    model_settings_override: Option<String>,
}

pub const DEFAULT_MODEL_SETTINGS_FILE: &str = ".aider.model.settings.yml";

impl Layout {
    pub fn new(settings: &Settings) -> Self {
        Self {
            config_dir: settings.config_dir.trim_end_matches('/').to_string(),
            thread_prefix: settings.thread_prefix.clone(),
            base_config: settings.base_config.clone(),
            model_settings_override: settings.model_settings_file.clone(),
        }
    }

    pub fn thread_prefix(&self) -> &str {
        &self.thread_prefix
    }

    pub fn base_config(&self) -> &str {
        &self.base_config
    }

    pub fn assistants_dir(&self) -> String {
        format!("{}/assistants", self.config_dir)
    }

    pub fn assistant_config(&self, name: &AssistantName) -> String {
        format!("{}/{name}.conf.yml", self.assistants_dir())
    }

    /// Inverse of [`Layout::assistant_config`] for entries listed from the tree.
    pub fn assistant_from_config_path(&self, path: &str) -> Option<AssistantName> {
        let file = path.strip_prefix(&self.assistants_dir())?.strip_prefix('/')?;
        let stem = file.strip_suffix(".conf.yml")?;
        AssistantName::parse(stem).ok()
    }

    pub fn instructions_file(&self, name: &AssistantName) -> String {
        format!("{}/instructions/{name}.md", self.config_dir)
    }

    pub fn thread_branch(&self, thread: &ThreadName) -> String {
        format!("{}/{thread}", self.thread_prefix)
    }

    pub fn history_file(&self, thread: &ThreadName) -> String {
        format!("{}/threads/{thread}.chat.history.md", self.config_dir)
    }

    pub fn parse_thread(&self, value: &str) -> Result<ThreadName, RequestError> {
        ThreadName::parse(value, &self.thread_prefix)
    }

    /// Registry path: explicit override, then the base config's key, then the default.
    pub fn model_settings_file(&self, from_base_config: Option<&str>) -> String {
        self.model_settings_override
            .as_deref()
            .or(from_base_config)
            .unwrap_or(DEFAULT_MODEL_SETTINGS_FILE)
            .to_string()
    }
}
