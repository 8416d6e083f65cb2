use crate::middleware::correlation::CorrelationId;
use crate::routes::error::ErrorEnvelope;
use crate::routes::{parse_body, respond};
use crate::AppState;
use agit_core::types::{
    CreateRunRequest, CreateThreadAndRunRequest, ListQuery, ListResponse, Run, RunStep,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/threads/runs", post(create_thread_and_run))
        .route("/threads/{thread_id}/runs", post(create_run).get(list_runs))
        .route(
            "/threads/{thread_id}/runs/{run_id}",
            get(get_run).post(modify_run),
        )
        .route("/threads/{thread_id}/runs/{run_id}/cancel", post(cancel_run))
        .route(
            "/threads/{thread_id}/runs/{run_id}/submit_tool_outputs",
            post(submit_tool_outputs),
        )
        .route("/threads/{thread_id}/runs/{run_id}/steps", get(list_run_steps))
        .route(
            "/threads/{thread_id}/runs/{run_id}/steps/{step_id}",
            get(get_run_step),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/runs",
    params(("thread_id" = String, Path, description = "Thread name")),
    request_body = CreateRunRequest,
    responses(
        (status = 201, body = Run),
        (status = 404, body = ErrorEnvelope),
        (status = 417, body = ErrorEnvelope),
        (status = 504, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_run(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = match parse_body::<CreateRunRequest>(&body) {
        Ok(request) => {
            state
                .run(move |agit| agit.runs().create(&thread_id, request))
                .await
        }
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/runs",
    request_body = CreateThreadAndRunRequest,
    responses(
        (status = 201, body = Run),
        (status = 409, body = ErrorEnvelope),
        (status = 417, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_thread_and_run(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    body: Bytes,
) -> Response {
    let result = match parse_body::<CreateThreadAndRunRequest>(&body) {
        Ok(request) => {
            state
                .run(move |agit| agit.runs().create_thread_and_run(request))
                .await
        }
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/runs",
    params(("thread_id" = String, Path, description = "Thread name"), ListQuery),
    responses((status = 200, body = ListResponse<Run>))
)]
pub(crate) async fn list_runs(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().list(&thread_id, &query))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/runs/{run_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit")
    ),
    responses(
        (status = 200, body = Run),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_run(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().get(&thread_id, &run_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/runs/{run_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit")
    ),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn modify_run(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().modify(&thread_id, &run_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/runs/{run_id}/cancel",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit")
    ),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn cancel_run(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().cancel(&thread_id, &run_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/runs/{run_id}/submit_tool_outputs",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit")
    ),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn submit_tool_outputs(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().submit_tool_outputs(&thread_id, &run_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/runs/{run_id}/steps",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit"),
        ListQuery
    ),
    responses(
        (status = 200, body = ListResponse<RunStep>),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn list_run_steps(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().list_steps(&thread_id, &run_id, &query))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/runs/{run_id}/steps/{step_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("run_id" = String, Path, description = "Run commit"),
        ("step_id" = String, Path, description = "Zero-based hunk ordinal")
    ),
    responses(
        (status = 200, body = RunStep),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_run_step(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, run_id, step_id)): Path<(String, String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.runs().get_step(&thread_id, &run_id, &step_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}
