//! Bearer credential handling.
//!
//! The raw credential only lives for the duration of one request. It is used as
//! the subject of the user-info call and is otherwise only ever seen hashed
//! (cache key) or as a short prefix (logs).
use sha2::{Digest, Sha256};

const LOG_PREFIX_LEN: usize = 8;

/// Strips an optional case-insensitive `Bearer ` scheme and surrounding
/// whitespace.
pub fn normalize(raw: &str) -> &str {
    let rest = raw.trim_start();
    match rest.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => rest[7..].trim(),
        _ => rest.trim_end(),
    }
}

/// Hex-encoded SHA-256 of the normalized credential.
pub fn hash(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

/// Safe-to-log form: the first eight characters, or `***` for short values.
pub fn log_prefix(credential: &str) -> String {
    match credential.char_indices().nth(LOG_PREFIX_LEN) {
        Some((end, _)) => format!("{}...", &credential[..end]),
        None => "***".to_string(),
    }
}
