//! Off-chain compute gateway for CCIP-Read (EIP-3668) lookups.
//!
//! The gateway resolves a human-readable name (e.g. `pricefeed.eth`) to a
//! verifiable, signed computation result. A caller (typically an on-chain
//! resolver reverting with an `OffchainLookup` directive, or an SDK calling
//! directly) POSTs a lookup request; the gateway decodes it, dispatches to
//! a registered deterministic compute function, wraps the result in a
//! canonical envelope, signs the envelope digest under EIP-191, and returns
//! ABI-encoded bytes the on-chain verifier accepts.
//!
//! # Modules
//!
//! - [`calldata`] — Decoding of the mixed-shape `data` field into `(method, params)`.
//! - [`cache`] — In-process TTL cache over compute results.
//! - [`config`] — Environment configuration (signing key, bind address).
//! - [`ens`] — EIP-137 namehash.
//! - [`envelope`] — Canonical envelope, digest preimage, ABI wire encoding.
//! - [`functions`] — Built-in sample compute function and default registry.
//! - [`gateway`] — The [`Gateway`](gateway::Gateway) trait the handlers bind to.
//! - [`gateway_local`] — Reference pipeline implementation.
//! - [`handlers`] — HTTP endpoint handlers.
//! - [`metrics`] — Request counters and dual-format exposition.
//! - [`proto`] — Request/response body types.
//! - [`rate_limit`] — Sliding-log admission control.
//! - [`registry`] — Compute function registry and dispatch.
//! - [`signer`] — EIP-191 digest signing behind a swappable trait.
//! - [`validate`] — Request validation and sanitation.
//!
//! # Guarantees
//!
//! - The envelope digest is keccak-256 over a canonical, deterministic
//!   preimage; equal content always hashes equally.
//! - Signatures are 65-byte `r ‖ s ‖ v` with `v ∈ {27, 28}` and low-S
//!   normalization, recoverable to the configured signer.
//! - Validation and rate limiting run before any compute function.

pub mod cache;
pub mod calldata;
pub mod config;
pub mod ens;
pub mod envelope;
pub mod functions;
pub mod gateway;
pub mod gateway_local;
pub mod handlers;
pub mod metrics;
pub mod proto;
pub mod rate_limit;
pub mod registry;
pub mod run;
pub mod signer;
pub mod telemetry;
pub mod timestamp;
pub mod validate;
