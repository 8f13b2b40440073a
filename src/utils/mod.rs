//! Small shared helpers: size formatting, id generation, hash shortening.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Format file size as human-readable string.
///
/// Always divides by 1024 (binary prefixes) and rounds to two decimals;
/// zero renders literally as "0 bytes".
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

/// First `len` hex characters of the SHA-256 digest of `input`.
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(len);
    hex
}

/// Hex SHA-256 digest of raw bytes. Used for flyer content hashes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Generate a random lowercase-alphanumeric record id.
pub fn generate_id() -> String {
    random_suffix(12)
}

/// Random lowercase-alphanumeric string of the given length.
pub fn random_suffix(len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
