//! Request body buffering stage.
//!
//! Reads the body once, before any concurrency slot is taken, so every
//! retry attempt can replay the same bytes. Unreadable or oversized bodies
//! are answered here and never reach the gate or the retry loop.

use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, Request};
use axum::response::Response;
use http_body_util::LengthLimitError;
use tower::{Layer, Service, ServiceExt};

use crate::http::middleware::BoxFuture;
use crate::http::response;

#[derive(Debug, Clone, Copy)]
pub struct BufferBodyLayer {
    limit: usize,
}

impl BufferBodyLayer {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl<S> Layer<S> for BufferBodyLayer {
    type Service = BufferBody<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BufferBody {
            inner,
            limit: self.limit,
        }
    }
}

/// Turns `Request<Body>` into `Request<Bytes>` for the stages below.
#[derive(Debug, Clone)]
pub struct BufferBody<S> {
    inner: S,
    limit: usize,
}

/// Whether a buffering failure came from the length limit rather than the
/// transport.
fn hit_limit(error: &axum::Error) -> bool {
    std::error::Error::source(error).is_some_and(|source| source.is::<LengthLimitError>())
}

fn declared_length<B>(request: &Request<B>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

impl<S> Service<Request<Body>> for BufferBody<S>
where
    S: Service<Request<Bytes>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limit = self.limit;

        if let Some(length) = declared_length(&request) {
            if length > limit as u64 {
                tracing::warn!(length, limit, "Request body exceeds limit");
                return Box::pin(async { Ok(response::body_too_large()) });
            }
        }

        let inner = self.inner.clone();
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) if hit_limit(&e) => {
                    tracing::warn!(limit, path = %parts.uri.path(), "Streamed request body exceeds limit");
                    return Ok(response::body_too_large());
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %parts.uri.path(), "Failed to read request body");
                    return Ok(response::unreadable_body());
                }
            };
            inner.oneshot(Request::from_parts(parts, bytes)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::service_fn;

    async fn echo(req: Request<Bytes>) -> Result<Response, Infallible> {
        Ok(Response::new(Body::from(req.into_body())))
    }

    #[tokio::test]
    async fn small_body_is_buffered() {
        let response = BufferBodyLayer::new(8)
            .layer(service_fn(echo))
            .oneshot(Request::new(Body::from("hello")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_up_front() {
        let request = Request::builder()
            .header(header::CONTENT_LENGTH, "1000")
            .body(Body::empty())
            .unwrap();
        let response = BufferBodyLayer::new(8)
            .layer(service_fn(echo))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn undeclared_oversize_is_too_large() {
        let request = Request::new(Body::from("far more than eight bytes"));
        assert!(!request.headers().contains_key(header::CONTENT_LENGTH));

        let response = BufferBodyLayer::new(8)
            .layer(service_fn(echo))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Request body too large");
    }

    #[tokio::test]
    async fn body_at_the_limit_is_accepted() {
        let response = BufferBodyLayer::new(8)
            .layer(service_fn(echo))
            .oneshot(Request::new(Body::from("12345678")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
