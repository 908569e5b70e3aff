use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tracing::Instrument;

/// Log one line per request and run the handler inside a span carrying the
/// request id, so handler logs can be correlated.
pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!("request", request_id = %req_id, method = %method, route = %route);
    let response = next.run(request).instrument(span.clone()).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    let _entered = span.enter();
    if status.is_server_error() {
        tracing::error!(uri = %uri, status = %status, duration_ms = %duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(uri = %uri, status = %status, duration_ms = %duration_ms, "request rejected");
    } else {
        tracing::info!(uri = %uri, status = %status, duration_ms = %duration_ms, "request completed");
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
