//! Core trait defining the lookup interface for compute gateways.
//!
//! Implementors run the full request pipeline: admission, validation,
//! call-data decoding, dispatch, and envelope construction. The HTTP
//! handlers are generic over this trait so tests can substitute a stub and a
//! remote-backed gateway can slot in without touching the routes.

use serde_json::json;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::envelope::EnvelopeError;
use crate::metrics::MetricsSnapshot;
use crate::proto;
use crate::rate_limit::{Admission, ClientId, RateLimited};
use crate::registry::{ComputeError, DispatchError};
use crate::signer::SignerError;

/// All failure modes a lookup can surface, in HTTP terms: validation → 400,
/// rate limiting → 429, everything else → 500.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// One or more request fields failed validation; reasons go into the
    /// response `details` array.
    #[error("Validation failed")]
    Validation(Vec<String>),
    /// Admission denied by the sliding-window limiter.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    /// The decoded method has no registered compute function.
    #[error("Unknown compute function: {0}")]
    UnknownMethod(String),
    /// The dispatched function itself failed.
    #[error("Compute function failed: {0}")]
    Compute(#[from] ComputeError),
    /// Envelope construction or ABI encoding failed. There is no automatic
    /// fallback to the legacy path.
    #[error("Envelope encoding failed: {0}")]
    Encoding(#[from] EnvelopeError),
    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RateLimited> for GatewayError {
    fn from(denied: RateLimited) -> Self {
        GatewayError::RateLimited {
            retry_after: denied.retry_after,
        }
    }
}

impl From<DispatchError> for GatewayError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::UnknownMethod(name) => GatewayError::UnknownMethod(name),
            DispatchError::Compute(cause) => GatewayError::Compute(cause),
        }
    }
}

impl GatewayError {
    /// JSON body for the error response.
    pub fn body(&self) -> serde_json::Value {
        match self {
            GatewayError::Validation(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            GatewayError::RateLimited { retry_after } => json!({
                "error": "Rate limit exceeded",
                "retryAfter": retry_after,
                "remaining": 0,
            }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

/// Trait defining the asynchronous interface of the compute gateway.
pub trait Gateway {
    /// The error type surfaced by the pipeline.
    type Error: Debug + Display;

    /// Admission decision for a client. Successful admission carries the
    /// `X-RateLimit-*` header values.
    fn admit(&self, client: &ClientId) -> Result<Admission, Self::Error>;

    /// Runs a full lookup: validate, decode, dispatch, build, encode.
    fn lookup(
        &self,
        request: proto::LookupRequest,
    ) -> impl Future<Output = Result<proto::LookupReply, Self::Error>> + Send;

    /// Direct dispatch bypassing call-data decoding and the envelope.
    fn compute(
        &self,
        request: proto::ComputeRequest,
    ) -> impl Future<Output = Result<proto::ComputeReply, Self::Error>> + Send;

    /// Registered compute function names.
    fn functions(&self) -> Vec<String>;

    fn health(&self) -> proto::HealthReply;

    fn metrics_text(&self) -> String;

    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl<T: Gateway + Send + Sync> Gateway for Arc<T> {
    type Error = T::Error;

    fn admit(&self, client: &ClientId) -> Result<Admission, Self::Error> {
        self.as_ref().admit(client)
    }

    fn lookup(
        &self,
        request: proto::LookupRequest,
    ) -> impl Future<Output = Result<proto::LookupReply, Self::Error>> + Send {
        self.as_ref().lookup(request)
    }

    fn compute(
        &self,
        request: proto::ComputeRequest,
    ) -> impl Future<Output = Result<proto::ComputeReply, Self::Error>> + Send {
        self.as_ref().compute(request)
    }

    fn functions(&self) -> Vec<String> {
        self.as_ref().functions()
    }

    fn health(&self) -> proto::HealthReply {
        self.as_ref().health()
    }

    fn metrics_text(&self) -> String {
        self.as_ref().metrics_text()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.as_ref().metrics_snapshot()
    }
}
