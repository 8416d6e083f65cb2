use agit_core::error::{
    AgentError, AgitError, AssistantError, RequestError, ThreadError, VcsError,
};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(value_type = String)]
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<String>,
}

pub fn map_error(
    err: &AgitError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code) = match err {
        AgitError::Request(request) => map_request_error(request),
        AgitError::Assistant(assistant) => map_assistant_error(assistant),
        AgitError::Thread(thread) => map_thread_error(thread),
        AgitError::Vcs(vcs) => map_vcs_error(vcs),
        AgitError::Agent(agent) => map_agent_error(agent),
        AgitError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        AgitError::UnsupportedOperation { .. } => {
            (StatusCode::NOT_IMPLEMENTED, "unsupported_operation")
        }
        AgitError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    if status.is_server_error() {
        tracing::error!(code, error = %err, correlation_id = ?correlation_id, "request failed");
    } else {
        tracing::debug!(code, error = %err, "request rejected");
    }

    (
        status,
        Json(ErrorEnvelope {
            error: ErrorBody {
                code,
                message: err.to_string(),
                correlation_id,
            },
        }),
    )
}

fn map_request_error(err: &RequestError) -> (StatusCode, &'static str) {
    let code = match err {
        RequestError::InvalidIdentifier { .. } => "invalid_identifier",
        RequestError::InvalidField { .. } => "invalid_field",
        RequestError::MissingField { .. } => "missing_field",
        RequestError::UnsupportedField { .. } => "unsupported_field",
    };
    (StatusCode::EXPECTATION_FAILED, code)
}

fn map_assistant_error(err: &AssistantError) -> (StatusCode, &'static str) {
    match err {
        AssistantError::AlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
        AssistantError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        AssistantError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
    }
}

fn map_thread_error(err: &ThreadError) -> (StatusCode, &'static str) {
    match err {
        ThreadError::AlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
        ThreadError::NotFound { .. }
        | ThreadError::MessageNotFound { .. }
        | ThreadError::RunNotFound { .. }
        | ThreadError::StepNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
    }
}

fn map_vcs_error(err: &VcsError) -> (StatusCode, &'static str) {
    match err {
        VcsError::SyncFailed { .. } => (StatusCode::BAD_GATEWAY, "sync_failed"),
        VcsError::RebaseConflict { .. } => (StatusCode::BAD_GATEWAY, "rebase_conflict"),
        VcsError::PushRejected { .. } => (StatusCode::BAD_GATEWAY, "push_rejected"),
        VcsError::RefAlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
        VcsError::DirtyWorkingCopy => (StatusCode::INTERNAL_SERVER_ERROR, "dirty_working_copy"),
        VcsError::RepoNotFound
        | VcsError::RefNotFound { .. }
        | VcsError::CommitNotFound { .. }
        | VcsError::NothingToCommit
        | VcsError::BackendError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "vcs_error"),
    }
}

fn map_agent_error(err: &AgentError) -> (StatusCode, &'static str) {
    match err {
        AgentError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "agent_timeout"),
        AgentError::Spawn { .. } | AgentError::InvalidCommand { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "agent_error")
        }
    }
}
