use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registro persistido por fingerprint. Se escribe una vez por fingerprint y
/// no se actualiza en sitio (salvo al reparar una entrada corrupta).
///
/// Los nombres de campo son los del layout en disco.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub api_url: String,
    pub api_call_body: Value,
    pub api_response: T,
    pub call_timestamp: DateTime<Utc>,
}
