use crate::middleware::correlation::CorrelationId;
use crate::routes::error::ErrorEnvelope;
use crate::routes::{parse_body, respond};
use crate::AppState;
use agit_core::types::{Assistant, CreateAssistantRequest, DeletionStatus, ListQuery, ListResponse};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/assistants", post(create_assistant).get(list_assistants))
        .route(
            "/assistants/{assistant_id}",
            get(get_assistant)
                .post(modify_assistant)
                .delete(delete_assistant),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v1/assistants",
    request_body = CreateAssistantRequest,
    responses(
        (status = 201, body = Assistant),
        (status = 409, body = ErrorEnvelope),
        (status = 417, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_assistant(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    body: Bytes,
) -> Response {
    let result = match parse_body::<CreateAssistantRequest>(&body) {
        Ok(request) => state.run(move |agit| agit.assistants().create(request)).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/assistants",
    params(ListQuery),
    responses((status = 200, body = ListResponse<Assistant>))
)]
pub(crate) async fn list_assistants(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = state.run(move |agit| agit.assistants().list(&query)).await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/assistants/{assistant_id}",
    params(("assistant_id" = String, Path, description = "Assistant name or creation commit")),
    responses(
        (status = 200, body = Assistant),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_assistant(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(assistant_id): Path<String>,
) -> Response {
    let result = state
        .run(move |agit| agit.assistants().get(&assistant_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/assistants/{assistant_id}",
    params(("assistant_id" = String, Path, description = "Assistant name or creation commit")),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn modify_assistant(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(assistant_id): Path<String>,
) -> Response {
    let result = state
        .run(move |agit| agit.assistants().modify(&assistant_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    delete,
    path = "/v1/assistants/{assistant_id}",
    params(("assistant_id" = String, Path, description = "Assistant name or creation commit")),
    responses(
        (status = 200, body = DeletionStatus),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn delete_assistant(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(assistant_id): Path<String>,
) -> Response {
    let result = state
        .run(move |agit| agit.assistants().delete(&assistant_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}
