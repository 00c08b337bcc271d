//! Configuration module for the compute gateway server.
//!
//! Everything comes from environment variables (a `.env` file is loaded at
//! startup):
//! - `GATEWAY_PRIVATE_KEY` — 32-byte hex signing key; when unset or zero the
//!   gateway warns and signs with the well-known development key,
//! - `PORT` — listen port, default 3000,
//! - `HOST` — bind address, default 0.0.0.0.

use alloy_primitives::B256;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

const ENV_PRIVATE_KEY: &str = "GATEWAY_PRIVATE_KEY";
const ENV_PORT: &str = "PORT";
const ENV_HOST: &str = "HOST";

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {ENV_PRIVATE_KEY}: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid {ENV_PORT}: {0}")]
    InvalidPort(String),
    #[error("Invalid {ENV_HOST}: {0}")]
    InvalidHost(String),
}

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    host: IpAddr,
    port: u16,
    private_key: B256,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = match env::var(ENV_HOST) {
            Ok(value) => IpAddr::from_str(&value)
                .map_err(|e| ConfigError::InvalidHost(format!("{value}: {e}")))?,
            Err(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = match env::var(ENV_PORT) {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort(format!("{value}: {e}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let private_key = match env::var(ENV_PRIVATE_KEY) {
            Ok(value) => parse_private_key(&value)?,
            Err(_) => B256::ZERO,
        };
        // The zero value doubles as the "unset" sentinel: it is not a valid
        // secp256k1 scalar, so it can never be a deliberate production key.
        let private_key = if private_key.is_zero() {
            tracing::warn!(
                "{ENV_PRIVATE_KEY} is not set; signing with the insecure development key"
            );
            development_key()
        } else {
            private_key
        };

        Ok(Self {
            host,
            port,
            private_key,
        })
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn private_key(&self) -> B256 {
        self.private_key
    }
}

fn parse_private_key(value: &str) -> Result<B256, ConfigError> {
    let stripped = value.trim().trim_start_matches("0x");
    let bytes = hex::decode(stripped)
        .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidPrivateKey("key must be 32 bytes".to_string()))?;
    Ok(B256::from(array))
}

/// Scalar 1: the smallest valid key, used only when no key is configured.
fn development_key() -> B256 {
    let mut key = [0u8; 32];
    key[31] = 1;
    B256::from(key)
}
