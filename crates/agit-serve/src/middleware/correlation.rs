use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use ulid::Ulid;

pub const HEADER_NAME: &str = "x-correlation-id";

/// Request-scoped id echoed on the response and in error envelopes.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(HEADER_NAME)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("corr_{}", Ulid::new()));
        Self(id)
    }
}

pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation = CorrelationId::from_headers(request.headers());
    let span = info_span!(
        "request",
        correlation_id = %correlation.0,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let id = correlation.0.clone();
    request.extensions_mut().insert(correlation);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(HEADER_NAME, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_caller_supplied_id() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_NAME, HeaderValue::from_static("abc-123"));
        assert_eq!(CorrelationId::from_headers(&headers).0, "abc-123");
    }

    #[test]
    fn generates_id_when_missing_or_blank() {
        let generated = CorrelationId::from_headers(&HeaderMap::new());
        assert!(generated.0.starts_with("corr_"));

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_NAME, HeaderValue::from_static("  "));
        assert!(CorrelationId::from_headers(&headers).0.starts_with("corr_"));
    }
}
