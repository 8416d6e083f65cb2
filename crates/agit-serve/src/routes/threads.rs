use crate::middleware::correlation::CorrelationId;
use crate::routes::error::ErrorEnvelope;
use crate::routes::{parse_body, parse_optional_body, respond};
use crate::AppState;
use agit_core::types::{
    CreateMessageRequest, CreateThreadRequest, DeletionStatus, ListResponse, Message,
    MessageListQuery, Thread,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/threads", post(create_thread))
        .route(
            "/threads/{thread_id}",
            get(get_thread).post(modify_thread).delete(delete_thread),
        )
        .route(
            "/threads/{thread_id}/messages",
            post(create_message).get(list_messages),
        )
        .route(
            "/threads/{thread_id}/messages/{message_id}",
            get(get_message).post(modify_message).delete(delete_message),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v1/threads",
    request_body = CreateThreadRequest,
    responses(
        (status = 201, body = Thread),
        (status = 409, body = ErrorEnvelope),
        (status = 417, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_thread(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    body: Bytes,
) -> Response {
    let result = match parse_optional_body::<CreateThreadRequest>(&body) {
        Ok(request) => state.run(move |agit| agit.threads().create(request)).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}",
    params(("thread_id" = String, Path, description = "Thread name, with or without the branch prefix")),
    responses(
        (status = 200, body = Thread),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_thread(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
) -> Response {
    let result = state.run(move |agit| agit.threads().get(&thread_id)).await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}",
    params(("thread_id" = String, Path, description = "Thread name")),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn modify_thread(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
) -> Response {
    let result = state.run(move |agit| agit.threads().modify(&thread_id)).await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    delete,
    path = "/v1/threads/{thread_id}",
    params(("thread_id" = String, Path, description = "Thread name")),
    responses(
        (status = 200, body = DeletionStatus),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn delete_thread(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
) -> Response {
    let result = state.run(move |agit| agit.threads().delete(&thread_id)).await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/messages",
    params(("thread_id" = String, Path, description = "Thread name")),
    request_body = CreateMessageRequest,
    responses(
        (status = 201, body = Message),
        (status = 404, body = ErrorEnvelope),
        (status = 417, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_message(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = match parse_body::<CreateMessageRequest>(&body) {
        Ok(request) => {
            state
                .run(move |agit| agit.messages().create(&thread_id, request))
                .await
        }
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/messages",
    params(("thread_id" = String, Path, description = "Thread name"), MessageListQuery),
    responses(
        (status = 200, body = ListResponse<Message>),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn list_messages(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(thread_id): Path<String>,
    Query(query): Query<MessageListQuery>,
) -> Response {
    let result = state
        .run(move |agit| agit.messages().list(&thread_id, &query))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/messages/{message_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("message_id" = String, Path, description = "Commit that wrote the message")
    ),
    responses(
        (status = 200, body = Message),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_message(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, message_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.messages().get(&thread_id, &message_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/messages/{message_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("message_id" = String, Path, description = "Commit that wrote the message")
    ),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn modify_message(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, message_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.messages().modify(&thread_id, &message_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}

#[utoipa::path(
    delete,
    path = "/v1/threads/{thread_id}/messages/{message_id}",
    params(
        ("thread_id" = String, Path, description = "Thread name"),
        ("message_id" = String, Path, description = "Commit that wrote the message")
    ),
    responses((status = 501, body = ErrorEnvelope))
)]
pub(crate) async fn delete_message(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((thread_id, message_id)): Path<(String, String)>,
) -> Response {
    let result = state
        .run(move |agit| agit.messages().delete(&thread_id, &message_id))
        .await;
    respond(StatusCode::OK, result, correlation)
}
