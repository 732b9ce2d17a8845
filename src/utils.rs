use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

pub fn utc_now_rfc3339() -> String {
    utc_now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SHA256(prev_hash || payload), hex encoded.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
