use axum::http::Request;
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{
        DefaultOnBodyChunk, DefaultOnEos, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse,
        TraceLayer,
    },
};
use tracing::Span;

use super::request_id::{RequestId, REQUEST_ID_HEADER};

/// Span maker that tags every HTTP span with the request ID
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpanMaker;

impl<B> tower_http::trace::MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| {
                request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(RequestId::new)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
            version = ?request.version(),
        )
    }
}

/// Trace layer that classifies 5xx responses as failures
pub fn configure_http_tracing() -> TraceLayer<
    SharedClassifier<StatusInRangeAsFailures>,
    RequestSpanMaker,
    DefaultOnRequest,
    DefaultOnResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    DefaultOnFailure,
> {
    let classifier = StatusInRangeAsFailures::new(500..=599);
    TraceLayer::new(classifier.into_make_classifier()).make_span_with(RequestSpanMaker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower_http::trace::MakeSpan;

    #[test]
    fn span_maker_accepts_requests_without_request_id() {
        let mut maker = RequestSpanMaker;
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        // Must not panic when neither the extension nor the header is present
        let _span = maker.make_span(&request);
    }

    #[test]
    fn span_maker_reads_request_id_from_header() {
        let mut maker = RequestSpanMaker;
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(Body::empty())
            .unwrap();
        let _span = maker.make_span(&request);
    }
}
