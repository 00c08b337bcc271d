//! HTTP endpoints exposed by the compute gateway.
//!
//! The protocol-critical route is `POST /lookup`; `POST /compute` is the
//! direct-dispatch test surface, and the remaining routes expose health,
//! metrics, and the registered function list. Handlers are generic over the
//! [`Gateway`] trait, so the routes bind equally to the local implementation
//! and to test stubs.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use tracing::instrument;

use crate::gateway::{Gateway, GatewayError};
use crate::proto;
use crate::rate_limit::{Admission, ClientId};

/// Header selecting the api-key limiter tier.
pub const API_KEY_HEADER: &str = "x-api-key";

pub fn routes<G>() -> Router<G>
where
    G: Gateway + Clone + Send + Sync + 'static,
    G::Error: IntoResponse,
{
    Router::new()
        .route("/", get(get_root))
        .route("/lookup", post(post_lookup::<G>))
        .route("/compute", post(post_compute::<G>))
        .route("/health", get(get_health::<G>))
        .route("/metrics", get(get_metrics::<G>))
        .route("/api/metrics", get(get_api_metrics::<G>))
        .route("/functions", get(get_functions::<G>))
}

/// `GET /`: greeting, mostly useful as a liveness poke.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

/// `POST /lookup`: the CCIP-Read entry point. Admission runs first; admitted
/// requests flow through the pipeline and every response, success or
/// failure, carries the `X-RateLimit-*` headers of the admission.
#[instrument(skip_all)]
pub async fn post_lookup<G>(
    State(gateway): State<G>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<proto::LookupRequest>,
) -> Response
where
    G: Gateway,
    G::Error: IntoResponse,
{
    let client = client_id(&headers, addr);
    let admission = match gateway.admit(&client) {
        Ok(admission) => admission,
        Err(denied) => return denied.into_response(),
    };

    let mut response = match gateway.lookup(body).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "Lookup failed");
            error.into_response()
        }
    };
    apply_rate_limit_headers(&admission, response.headers_mut());
    response
}

/// `POST /compute`: direct dispatch, same admission and validation as
/// `/lookup` but bypassing call-data decoding and the envelope.
#[instrument(skip_all)]
pub async fn post_compute<G>(
    State(gateway): State<G>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<proto::ComputeRequest>,
) -> Response
where
    G: Gateway,
    G::Error: IntoResponse,
{
    let client = client_id(&headers, addr);
    let admission = match gateway.admit(&client) {
        Ok(admission) => admission,
        Err(denied) => return denied.into_response(),
    };

    let mut response = match gateway.compute(body).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "Compute failed");
            error.into_response()
        }
    };
    apply_rate_limit_headers(&admission, response.headers_mut());
    response
}

#[instrument(skip_all)]
pub async fn get_health<G>(State(gateway): State<G>) -> impl IntoResponse
where
    G: Gateway,
{
    Json(gateway.health())
}

/// `GET /metrics`: Prometheus text exposition.
#[instrument(skip_all)]
pub async fn get_metrics<G>(State(gateway): State<G>) -> impl IntoResponse
where
    G: Gateway,
{
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gateway.metrics_text(),
    )
}

/// `GET /api/metrics`: JSON snapshot of the same counters.
#[instrument(skip_all)]
pub async fn get_api_metrics<G>(State(gateway): State<G>) -> impl IntoResponse
where
    G: Gateway,
{
    Json(gateway.metrics_snapshot())
}

#[instrument(skip_all)]
pub async fn get_functions<G>(State(gateway): State<G>) -> impl IntoResponse
where
    G: Gateway,
{
    Json(proto::FunctionsReply {
        functions: gateway.functions(),
    })
}

fn client_id(headers: &HeaderMap, addr: SocketAddr) -> ClientId {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|key| ClientId::ApiKey(key.to_string()))
        .unwrap_or_else(|| ClientId::Ip(addr.ip()))
}

fn apply_rate_limit_headers(admission: &Admission, headers: &mut HeaderMap) {
    let pairs = [
        ("x-ratelimit-limit", admission.limit.to_string()),
        ("x-ratelimit-remaining", admission.remaining.to_string()),
        ("x-ratelimit-reset", admission.reset.clone()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UnknownMethod(_)
            | GatewayError::Compute(_)
            | GatewayError::Encoding(_)
            | GatewayError::Signing(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComputeError;
    use serde_json::json;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                GatewayError::Validation(vec!["Invalid ENS name".to_string()]),
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::RateLimited { retry_after: 60 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                GatewayError::UnknownMethod("nosuch".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::Compute(ComputeError::new("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_validation_body_carries_details() {
        let error = GatewayError::Validation(vec!["Invalid ENS name".to_string()]);
        let body = error.body();
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0], "Invalid ENS name");
    }

    #[test]
    fn test_rate_limited_body_shape() {
        let error = GatewayError::RateLimited { retry_after: 60 };
        let body = error.body();
        assert_eq!(
            body,
            json!({"error": "Rate limit exceeded", "retryAfter": 60, "remaining": 0})
        );
    }

    #[test]
    fn test_client_id_prefers_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        let addr: SocketAddr = "1.2.3.4:5000".parse().unwrap();
        assert_eq!(
            client_id(&headers, addr),
            ClientId::ApiKey("secret".to_string())
        );
        assert_eq!(
            client_id(&HeaderMap::new(), addr),
            ClientId::Ip("1.2.3.4".parse().unwrap())
        );
    }

    #[test]
    fn test_rate_limit_headers_applied() {
        let admission = Admission {
            limit: 100,
            remaining: 99,
            reset: "2023-11-14T22:14:20.000Z".to_string(),
        };
        let mut headers = HeaderMap::new();
        apply_rate_limit_headers(&admission, &mut headers);
        assert_eq!(headers["x-ratelimit-limit"], "100");
        assert_eq!(headers["x-ratelimit-remaining"], "99");
        assert_eq!(headers["x-ratelimit-reset"], "2023-11-14T22:14:20.000Z");
    }
}
