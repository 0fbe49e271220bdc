use std::fmt;

use serde_json::{json, Value};

use crate::constants::FINGERPRINT_PREFIX_LEN;
use crate::hashing::{sha256_hex, to_canonical_json};

/// Fingerprint de una entrada de cache: prefijo hex del SHA-256 del JSON
/// canónico de `(operación, payload)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(operation: &str, payload: &Value) -> Self {
        let input = json!({ "api_url": operation, "api_body": payload });
        let digest = sha256_hex(&to_canonical_json(&input));
        Self(digest[..FINGERPRINT_PREFIX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
