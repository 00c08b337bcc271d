//! Reference gateway implementation running the full lookup pipeline
//! in-process.
//!
//! A request moves through admission, validation, call-data decoding,
//! dispatch (with the result cache in front), envelope construction and ABI
//! encoding, strictly in that order; validation and rate-limit failures
//! short-circuit before any compute function runs. Every terminal outcome,
//! success or failure, lands in the metrics recorder with the method name
//! and the request latency.

use alloy_primitives::keccak256;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::cache::{self, ComputeCache};
use crate::calldata::{CallData, LookupCall};
use crate::envelope::{DEFAULT_CACHE_TTL_SECS, EnvelopeBuilder, EnvelopeError, wire};
use crate::gateway::{Gateway, GatewayError};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::proto;
use crate::rate_limit::{Admission, ClientId, RateLimiters};
use crate::registry::{ComputeRegistry, JsonMap};
use crate::signer::DigestSigner;
use crate::timestamp::UnixTimestamp;
use crate::validate;

/// Method label recorded when a request fails before call-data decoding.
const METHOD_UNKNOWN: &str = "unknown";

pub struct GatewayLocal {
    signer: Arc<dyn DigestSigner>,
    registry: ComputeRegistry,
    limiters: RateLimiters,
    cache: ComputeCache,
    metrics: Arc<MetricsRecorder>,
}

impl GatewayLocal {
    pub fn new(signer: Arc<dyn DigestSigner>, registry: ComputeRegistry) -> Self {
        Self {
            signer,
            registry,
            limiters: RateLimiters::new(),
            cache: ComputeCache::new(std::time::Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn signer_address(&self) -> String {
        self.signer.address().to_string()
    }

    /// Evicts expired limiter buckets and cache entries. Driven by the
    /// periodic background task.
    pub fn sweep_expired(&self) {
        self.limiters.sweep();
        self.cache.sweep();
    }

    /// Dispatch with the result cache in front. The limiter lock is never
    /// held here; compute functions are free to suspend.
    async fn dispatch_cached(&self, method: &str, params: JsonMap) -> Result<Value, GatewayError> {
        let key = cache::cache_key(method, &params);
        if let Some(hit) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            return Ok(hit);
        }
        self.metrics.record_cache_miss();
        let value = self.registry.dispatch(method, params).await?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Signs raw result bytes the legacy way: EIP-191 over
    /// `keccak256(utf8(json(result)))`.
    async fn sign_result_bytes(
        &self,
        result: &Value,
    ) -> Result<(Vec<u8>, crate::signer::EnvelopeSignature), GatewayError> {
        let result_bytes =
            serde_json::to_vec(result).map_err(|source| EnvelopeError::Serialize {
                field: "result",
                source,
            })?;
        let digest = keccak256(&result_bytes);
        let signature = self.signer.sign_digest(&digest).await?;
        self.metrics.record_signature_generated();
        Ok((result_bytes, signature))
    }

    async fn run_lookup(
        &self,
        mut request: proto::LookupRequest,
        method_label: &mut String,
    ) -> Result<proto::LookupReply, GatewayError> {
        validate::validate_lookup(&mut request).map_err(GatewayError::Validation)?;

        let LookupCall { method, params } = CallData::classify(request.data.as_ref()).decode();
        *method_label = method.clone();

        let result = self.dispatch_cached(&method, params.clone()).await?;

        if request.wants_envelope() {
            let envelope = EnvelopeBuilder::new(request.name.clone().unwrap_or_default(), method.as_str())
                .params(Value::Object(params))
                .result(result)
                .sign(self.signer.as_ref())
                .await?;
            self.metrics.record_signature_generated();

            // Envelope signatures must recover to the configured signer
            // before they leave the process.
            let verified = envelope
                .signature
                .recover(&envelope.digest)
                .map(|address| address == self.signer.address())
                .unwrap_or(false);
            self.metrics.record_signature_verified(verified);
            if !verified {
                return Err(GatewayError::Internal(
                    "Envelope signature does not recover to the gateway signer".to_string(),
                ));
            }

            Ok(proto::LookupReply {
                data: envelope.wire_hex(),
                envelope: Some(envelope),
            })
        } else {
            let (result_bytes, signature) = self.sign_result_bytes(&result).await?;
            Ok(proto::LookupReply {
                data: wire::encode_legacy_hex(&result_bytes, &signature),
                envelope: None,
            })
        }
    }

    async fn run_compute(
        &self,
        mut request: proto::ComputeRequest,
        method_label: &mut String,
    ) -> Result<proto::ComputeReply, GatewayError> {
        validate::validate_compute(&mut request).map_err(GatewayError::Validation)?;

        *method_label = request.function.clone();
        let params = match request.params {
            Some(Value::Object(map)) => map,
            _ => JsonMap::new(),
        };

        let result = self.dispatch_cached(&request.function, params).await?;
        let (_, signature) = self.sign_result_bytes(&result).await?;

        Ok(proto::ComputeReply {
            result,
            signature: signature.to_hex(),
            signer: self.signer_address(),
        })
    }
}

impl Gateway for GatewayLocal {
    type Error = GatewayError;

    fn admit(&self, client: &ClientId) -> Result<Admission, GatewayError> {
        Ok(self.limiters.admit(client)?)
    }

    #[instrument(skip_all)]
    async fn lookup(
        &self,
        request: proto::LookupRequest,
    ) -> Result<proto::LookupReply, GatewayError> {
        let started = Instant::now();
        let mut method_label = METHOD_UNKNOWN.to_string();
        let result = self.run_lookup(request, &mut method_label).await;
        self.metrics.record_request(
            &method_label,
            result.is_ok(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        result
    }

    #[instrument(skip_all)]
    async fn compute(
        &self,
        request: proto::ComputeRequest,
    ) -> Result<proto::ComputeReply, GatewayError> {
        let started = Instant::now();
        let mut method_label = METHOD_UNKNOWN.to_string();
        let result = self.run_compute(request, &mut method_label).await;
        self.metrics.record_request(
            &method_label,
            result.is_ok(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        result
    }

    fn functions(&self) -> Vec<String> {
        self.registry.names()
    }

    fn health(&self) -> proto::HealthReply {
        proto::HealthReply {
            status: "ok".to_string(),
            signer: self.signer_address(),
            timestamp: UnixTimestamp::try_now().unwrap_or(UnixTimestamp(0)),
            uptime: self.metrics.uptime_seconds(),
        }
    }

    fn metrics_text(&self) -> String {
        self.metrics.render_text()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
