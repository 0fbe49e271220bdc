//! Hash helpers.
//!
//! - `hash_str` / `hash_value`: blake3, identidad de contenido de artifacts y
//!   fingerprint agregado de un run.
//! - `sha256_hex`: digest del fingerprint de cache, calculado sobre el JSON
//!   canónico (claves ordenadas).

use blake3::Hasher;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::to_canonical_json;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash blake3 del JSON canonicalizado.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// SHA-256 en hex minúsculas (64 caracteres).
pub fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes()).iter().map(|b| format!("{b:02x}")).collect()
}
