use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, SystemTimeError};

/// A Unix timestamp represented as a `u64`, seconds since the epoch.
///
/// Used for the envelope `meta.timestamp` field and the `/health` report.
/// Serialized as a plain JSON number; the canonical envelope preimage embeds
/// it inside the `meta` JSON string, so a numeric form keeps the preimage
/// identical to what the on-chain verifier reconstructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnixTimestamp(pub u64);

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UnixTimestamp {
    pub fn try_now() -> Result<Self, SystemTimeError> {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_secs();
        Ok(Self(now))
    }

    pub fn seconds_since_epoch(&self) -> u64 {
        self.0
    }
}
