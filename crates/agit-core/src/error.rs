use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{field} must be alphanumeric with underscores: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },
    #[error("{field} needs to be set")]
    MissingField { field: &'static str },
    #[error("{field} is not supported")]
    UnsupportedField { field: &'static str },
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant already exists: {id}")]
    AlreadyExists { id: String },
    #[error("model settings already contain an entry named {id}")]
    Conflict { id: String },
    #[error("assistant not found: {id}")]
    NotFound { id: String },
}

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("thread already exists: {id}")]
    AlreadyExists { id: String },
    #[error("thread not found: {id}")]
    NotFound { id: String },
    #[error("message {message_id} not found on thread {thread_id}")]
    MessageNotFound {
        thread_id: String,
        message_id: String,
    },
    #[error("run {run_id} not found on thread {thread_id}")]
    RunNotFound { thread_id: String, run_id: String },
    #[error("step {step_id} not found in run {run_id}")]
    StepNotFound { run_id: String, step_id: String },
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

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid agent command: {message}")]
    InvalidCommand { message: String },
    #[error("failed to spawn agent: {message}")]
    Spawn { message: String },
    #[error("agent timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl From<agit_vcs::VcsError> for VcsError {
    fn from(value: agit_vcs::VcsError) -> Self {
        match value {
            agit_vcs::VcsError::RepoNotFound => Self::RepoNotFound,
            agit_vcs::VcsError::DirtyWorkingCopy => Self::DirtyWorkingCopy,
            agit_vcs::VcsError::RefAlreadyExists { name } => Self::RefAlreadyExists { name },
            agit_vcs::VcsError::RefNotFound { name } => Self::RefNotFound { name },
            agit_vcs::VcsError::CommitNotFound { id } => Self::CommitNotFound { id },
            agit_vcs::VcsError::NothingToCommit => Self::NothingToCommit,
            agit_vcs::VcsError::SyncFailed { reason } => Self::SyncFailed { reason },
            agit_vcs::VcsError::RebaseConflict { target } => Self::RebaseConflict { target },
            agit_vcs::VcsError::PushRejected { reason } => Self::PushRejected { reason },
            agit_vcs::VcsError::BackendError { reason } => Self::BackendError { reason },
        }
    }
}

#[derive(Debug, Error)]
pub enum AgitError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Thread(#[from] ThreadError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{operation} is not supported")]
    UnsupportedOperation { operation: &'static str },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<agit_vcs::VcsError> for AgitError {
    fn from(value: agit_vcs::VcsError) -> Self {
        AgitError::Vcs(VcsError::from(value))
    }
}

impl AgitError {
    pub fn unsupported(operation: &'static str) -> Self {
        Self::UnsupportedOperation { operation }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
