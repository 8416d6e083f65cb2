pub mod assistants;
pub mod error;
pub mod runs;
pub mod threads;

use crate::middleware::correlation::{correlation_middleware, CorrelationId};
use crate::{openapi, AppState};
use agit_core::error::RequestError;
use agit_core::AgitError;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use error::map_error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(assistants::router(state.clone()))
        .merge(threads::router(state.clone()))
        .merge(runs::router(state))
        .merge(openapi::router())
        .route_layer(middleware::from_fn(correlation_middleware));

    Router::new()
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
}

/// Decodes a JSON body, reporting malformed input as a request error.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AgitError> {
    serde_json::from_slice(body).map_err(|err| {
        RequestError::InvalidField {
            field: "body",
            message: err.to_string(),
        }
        .into()
    })
}

/// Like [`parse_body`], but an empty body is `None`.
pub(crate) fn parse_optional_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, AgitError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    parse_body(body).map(Some)
}

pub(crate) fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, AgitError>,
    correlation: CorrelationId,
) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
