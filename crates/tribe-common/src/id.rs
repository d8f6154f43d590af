//! Run and worker identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a worker thread within one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub usize);

impl WorkerId {
    /// Deterministic RNG seed for this worker.
    pub fn seed(&self, global_seed: u64) -> u64 {
        derive_seed(global_seed, self.0 as u64)
    }
}

/// Derive an independent 64-bit seed for `stream` from a global seed.
///
/// splitmix64 finaliser, so neighbouring streams are uncorrelated.
pub fn derive_seed(global_seed: u64, stream: u64) -> u64 {
    let mut z = global_seed
        .wrapping_add(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(stream.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for WorkerId {
    fn from(id: usize) -> Self {
        WorkerId(id)
    }
}

/// Identifier for one training run, used to correlate log lines.
///
/// Format: `tf-YYYYMMDD-HHMMSS-xxxxxxxx`
/// Example: `tf-20260115-143022-a7c91f02`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        RunId(format!(
            "tf-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            &uuid[..8]
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 27 || !s.starts_with("tf-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes[11] != b'-' || bytes[18] != b'-' {
            return None;
        }
        let digits = s[3..11].chars().chain(s[12..18].chars());
        if !digits.into_iter().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !s[19..].chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
