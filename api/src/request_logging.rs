use poem::{Endpoint, IntoResponse, Middleware, Request, Response};
use std::time::{Duration, Instant};

/// Requests slower than this are logged at warn level even when they succeed
const SLOW_REQUEST: Duration = Duration::from_millis(1000);

/// Middleware that logs each request with method, path, status, duration and client IP
pub struct RequestLogging;

impl<E: Endpoint> Middleware<E> for RequestLogging {
    type Output = RequestLoggingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RequestLoggingEndpoint { inner: ep }
    }
}

pub struct RequestLoggingEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for RequestLoggingEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> poem::Result<Self::Output> {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let client_ip = req
            .remote_addr()
            .as_socket_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let result = self.inner.call(req).await.map(IntoResponse::into_response);
        let elapsed = start.elapsed();
        let duration_ms = elapsed.as_millis();

        let status = match &result {
            Ok(resp) => resp.status(),
            Err(err) => err.status(),
        };

        if let Err(err) = &result {
            tracing::error!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                client_ip = %client_ip,
                error = %err,
                "request error"
            );
        } else if status.is_client_error() || status.is_server_error() {
            tracing::warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                client_ip = %client_ip,
                "request failed"
            );
        } else if elapsed > SLOW_REQUEST {
            tracing::warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                client_ip = %client_ip,
                "slow request"
            );
        } else {
            tracing::info!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                client_ip = %client_ip,
                "request completed"
            );
        }

        result
    }
}
