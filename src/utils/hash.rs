use sha2::{Digest, Sha256};

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Token rendered into the upload form, derived from a UNIX timestamp.
/// It is not checked on submission.
pub fn freshness_token(unix_secs: i64) -> String {
    calculate_hash(unix_secs.to_string().as_bytes())
}
