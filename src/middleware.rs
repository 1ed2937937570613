use std::any::Any;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

/// wrap
///
/// Applies the standard middleware chain around a fully assembled router.
/// Listed outermost first: panic recovery, request-id generation, request
/// logging, request-id propagation, security headers. Requests pass through
/// in that order and responses flow back in reverse; every stage invokes the
/// next one exactly once.
pub fn wrap(router: Router) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    router.layer(
        ServiceBuilder::new()
            // Outermost: a panicking handler must never take the process down
            // or leak partial output past this point.
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(request_span)
                    // Logged on the way in, so every request is recorded
                    // regardless of how it ends.
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(from_fn(secure_headers)),
    )
}

/// request_span
///
/// Span for `TraceLayer` covering one request: method, URI, protocol version,
/// and the generated request id, so all log lines for a request correlate.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        version = ?request.version(),
        req_id = %request_id,
    )
}

/// secure_headers
///
/// Stamps the fixed security header set on every outgoing response, whatever
/// its status. Sits innermost in the chain so even handler-produced error
/// responses carry the set; only a panic short-circuits above it.
async fn secure_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    response
}

/// recover_panic
///
/// Converts a caught handler panic into a generic 500. The response is built
/// whole here, after the panic, so the client never sees partial output. The
/// connection is marked for closure: its state after an unwound handler is
/// unknown.
fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message
    } else {
        "non-string panic payload"
    };
    tracing::error!(panic = detail, "request handler panicked");

    let mut response =
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
