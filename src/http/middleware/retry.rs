//! Buffering retry stage.
//!
//! Every attempt runs the downstream handler against an in-memory sink
//! (`BufferedResponse`). The first attempt with a status below 500 is
//! forwarded as-is; server errors and handler failures are discarded,
//! followed by a backoff sleep, until the attempt bound is reached and the
//! client gets a 503 instead.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::Request;
use axum::response::Response;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::http::middleware::BoxFuture;
use crate::http::request::{replay, X_REQUEST_ID};
use crate::http::response::{self, BufferedResponse, Outcome};
use crate::observability::metrics;
use crate::resilience::retries::{is_terminal, RetryPolicy};

#[derive(Debug, Clone, Copy)]
pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            policy: self.policy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Retry<S> {
    inner: S,
    policy: RetryPolicy,
}

/// Run one attempt and drain its response into memory.
async fn attempt<S>(service: S, request: Request<Body>) -> Result<BufferedResponse, BoxError>
where
    S: Service<Request<Body>, Response = Response>,
    S::Error: Into<BoxError>,
{
    let response = service.oneshot(request).await.map_err(Into::into)?;
    Ok(BufferedResponse::capture(response).await?)
}

impl<S> Service<Request<Bytes>> for Retry<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let inner = self.inner.clone();
        let policy = self.policy;

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let request_id = parts
                .headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_owned();
            let attempts = policy.attempts();

            for n in 1..=attempts {
                match attempt(inner.clone(), replay(&parts, &body)).await {
                    Ok(buffered) if is_terminal(buffered.status) => {
                        if n > 1 {
                            tracing::info!(
                                request_id = %request_id,
                                attempt = n,
                                status = %buffered.status,
                                "Downstream recovered after retry"
                            );
                        }
                        let mut response = buffered.into_response();
                        response.extensions_mut().insert(Outcome::Served { attempts: n });
                        return Ok(response);
                    }
                    Ok(buffered) => {
                        tracing::warn!(
                            request_id = %request_id,
                            attempt = n,
                            status = %buffered.status,
                            "Downstream returned server error"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            request_id = %request_id,
                            attempt = n,
                            error = %e,
                            "Downstream attempt failed"
                        );
                    }
                }

                if policy.has_attempts_after(n) {
                    let delay = policy.delay_after(n);
                    tracing::info!(
                        request_id = %request_id,
                        attempt = n,
                        delay = ?delay,
                        "Retrying request"
                    );
                    metrics::record_retry(n + 1);
                    tokio::time::sleep(delay).await;
                }
            }

            tracing::warn!(request_id = %request_id, attempts, "Retries exhausted");
            metrics::record_retries_exhausted();
            Ok(response::retries_exhausted(attempts))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BackoffPolicy;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tower::service_fn;

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = {
            let calls = calls.clone();
            RetryLayer::new(RetryPolicy::default()).layer(service_fn(move |_req: Request<Body>| {
                calls.lock().unwrap().push(Instant::now());
                async { Ok::<_, Infallible>((StatusCode::INTERNAL_SERVER_ERROR, "nope").into_response()) }
            }))
        };

        let start = Instant::now();
        let response = svc.oneshot(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let offsets: Vec<_> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        assert_eq!(offsets, [0, 1, 3, 7, 15]);
        // No sleep after the final attempt.
        assert_eq!(start.elapsed().as_secs(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = {
            let calls = calls.clone();
            RetryLayer::new(RetryPolicy::default()).layer(service_fn(move |_req: Request<Body>| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Infallible>((StatusCode::NOT_FOUND, "missing").into_response()) }
            }))
        };

        let response = svc.oneshot(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<Outcome>(),
            Some(&Outcome::Served { attempts: 1 })
        );
        assert_eq!(&body_of(response).await[..], b"missing");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_errors_count_as_failed_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = {
            let calls = calls.clone();
            let policy = RetryPolicy {
                max_attempts: 3,
                backoff: BackoffPolicy::default(),
            };
            RetryLayer::new(policy).layer(service_fn(move |_req: Request<Body>| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err::<Response, BoxError>("connection reset".into())
                    } else {
                        Ok(Response::new(Body::from("second time lucky")))
                    }
                }
            }))
        };

        let response = svc.oneshot(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_sees_the_full_body() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = {
            let seen = seen.clone();
            RetryLayer::new(RetryPolicy::default()).layer(service_fn(move |req: Request<Body>| {
                let seen = seen.clone();
                async move {
                    let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
                    let mut seen = seen.lock().unwrap();
                    seen.push(body);
                    let status = if seen.len() < 3 {
                        StatusCode::BAD_GATEWAY
                    } else {
                        StatusCode::OK
                    };
                    Ok::<_, Infallible>(status.into_response())
                }
            }))
        };

        let request = Request::new(Bytes::from_static(b"order #42"));
        let response = svc.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|b| &b[..] == b"order #42"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = {
            let calls = calls.clone();
            RetryLayer::new(RetryPolicy::default()).layer(service_fn(move |_req: Request<Body>| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Infallible>(StatusCode::INTERNAL_SERVER_ERROR.into_response()) }
            }))
        };

        // Attempts at 0s and 1s; the caller gives up during the 2s backoff.
        let result =
            tokio::time::timeout(Duration::from_millis(1500), svc.oneshot(Request::new(Bytes::new())))
                .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
