use crate::routes::error::{ErrorBody, ErrorEnvelope};
use agit_core::types::{
    Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    CreateThreadAndRunRequest, CreateThreadRequest, DeletionStatus, DiffLine, DiffLineKind,
    ListQuery, Message, MessageContent, MessageContentInput, MessageContentPart,
    MessageListQuery, MessageRole, ResponseFormat, ResponseFormatMode, ResponseFormatObject, Run,
    RunError, RunStatus, RunStep, RunStepType, SortOrder, StepDetails, TextContent, Thread,
    ThreadMetadata,
};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "agit", description = "Assistants, threads and runs kept in a git repository"),
    paths(
        crate::routes::assistants::create_assistant,
        crate::routes::assistants::list_assistants,
        crate::routes::assistants::get_assistant,
        crate::routes::assistants::modify_assistant,
        crate::routes::assistants::delete_assistant,
        crate::routes::threads::create_thread,
        crate::routes::threads::get_thread,
        crate::routes::threads::modify_thread,
        crate::routes::threads::delete_thread,
        crate::routes::threads::create_message,
        crate::routes::threads::list_messages,
        crate::routes::threads::get_message,
        crate::routes::threads::modify_message,
        crate::routes::threads::delete_message,
        crate::routes::runs::create_run,
        crate::routes::runs::create_thread_and_run,
        crate::routes::runs::list_runs,
        crate::routes::runs::get_run,
        crate::routes::runs::modify_run,
        crate::routes::runs::cancel_run,
        crate::routes::runs::submit_tool_outputs,
        crate::routes::runs::list_run_steps,
        crate::routes::runs::get_run_step,
    ),
    components(schemas(
        Assistant,
        CreateAssistantRequest,
        ResponseFormat,
        ResponseFormatMode,
        ResponseFormatObject,
        Thread,
        ThreadMetadata,
        CreateThreadRequest,
        Message,
        MessageRole,
        MessageContent,
        TextContent,
        MessageContentInput,
        MessageContentPart,
        CreateMessageRequest,
        MessageListQuery,
        Run,
        RunStatus,
        RunError,
        RunStep,
        RunStepType,
        StepDetails,
        DiffLine,
        DiffLineKind,
        CreateRunRequest,
        CreateThreadAndRunRequest,
        ListQuery,
        SortOrder,
        DeletionStatus,
        ErrorEnvelope,
        ErrorBody,
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>agit API</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: '/v1/openapi.json', dom_id: '#swagger-ui' });
    </script>
  </body>
</html>
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec: serde_json::Value = serde_json::from_str(&generate_spec()).unwrap();
        let paths = spec["paths"].as_object().unwrap();
        for path in [
            "/v1/assistants",
            "/v1/assistants/{assistant_id}",
            "/v1/threads",
            "/v1/threads/runs",
            "/v1/threads/{thread_id}/messages",
            "/v1/threads/{thread_id}/runs/{run_id}/steps/{step_id}",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
