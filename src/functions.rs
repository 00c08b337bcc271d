//! Built-in sample compute function.
//!
//! Deployments register their own functions through
//! [`ComputeRegistryBuilder`](crate::registry::ComputeRegistryBuilder); the
//! binary ships one `pricefeed` sample backed by a static reference table so
//! a fresh gateway answers the decoder's default method out of the box.
//! Swap it for an adapter over a live market-data source in production.

use serde_json::{Value, json};

use crate::registry::{ComputeError, ComputeRegistry, ComputeRegistryBuilder, JsonMap, RegistryError};

/// Reference quotes: `(params.pair, display pair, USD price)`.
const REFERENCE_PRICES: &[(&str, &str, f64)] = &[
    ("ethereum", "ETH/USD", 3120.23),
    ("bitcoin", "BTC/USD", 67241.80),
    ("solana", "SOL/USD", 148.55),
];

async fn pricefeed(params: JsonMap) -> Result<Value, ComputeError> {
    let pair = params
        .get("pair")
        .and_then(Value::as_str)
        .unwrap_or("ethereum");
    let (_, display, price) = REFERENCE_PRICES
        .iter()
        .find(|(key, _, _)| *key == pair)
        .ok_or_else(|| ComputeError::new(format!("Unknown trading pair: {pair}")))?;
    Ok(json!({
        "success": true,
        "data": { "pair": display, "price": price, "currency": "usd" },
        "type": "pricefeed",
    }))
}

/// Registry wired into the standalone binary.
pub fn default_registry() -> Result<ComputeRegistry, RegistryError> {
    Ok(ComputeRegistryBuilder::new()
        .register_fn("pricefeed", pricefeed)?
        .build())
}
