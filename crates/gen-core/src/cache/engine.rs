use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{CacheBackend, CacheEntry, InMemoryCacheBackend, SingleFlight};
use crate::constants::ENTRY_SUFFIX;
use crate::errors::CacheError;
use crate::model::Fingerprint;

/// Resultado de `get_or_compute`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    /// Prefijo de la entrada (fingerprint); base de los companions.
    pub prefix: String,
    pub data: T,
    /// `true` si se sirvió desde el store sin invocar `compute`.
    pub hit: bool,
}

/// Capacidad de escritura de companions bajo el prefijo de una entrada.
#[derive(Debug, Clone)]
pub struct CompanionWriter {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
}

impl CompanionWriter {
    pub fn cache_prefix(&self) -> &str {
        &self.prefix
    }

    /// Escribe `<prefix><suffix>` y devuelve su ubicación.
    ///
    /// Los sufijos que caen sobre la entrada (`.json`) o sus temporales
    /// (`.json.*`) se rechazan.
    pub async fn write_companion(&self, suffix: &str, data: impl AsRef<[u8]>) -> Result<PathBuf, CacheError> {
        if is_reserved_suffix(suffix) {
            return Err(CacheError::ReservedSuffix(suffix.to_string()));
        }
        self.backend.write_companion(&self.prefix, suffix, data.as_ref()).await
    }

    pub fn location(&self, suffix: &str) -> PathBuf {
        self.backend.companion_location(&self.prefix, suffix)
    }
}

fn is_reserved_suffix(suffix: &str) -> bool {
    suffix == ENTRY_SUFFIX || suffix.starts_with(&format!("{ENTRY_SUFFIX}."))
}

/// Cache read-through direccionada por contenido.
///
/// Garantías:
/// - Mismo `(operation, payload)` ⇒ misma entrada, entre procesos y runs.
/// - Una entrada ausente, ilegible o corrupta es un miss; esos errores se
///   registran con `warn!` y nunca llegan al caller.
/// - Sólo los errores del `compute` se propagan.
/// - Con single-flight activo (por defecto), llamadas concurrentes con el
///   mismo fingerprint comparten una única invocación de `compute`.
#[derive(Debug, Clone)]
pub struct CacheEngine {
    backend: Arc<dyn CacheBackend>,
    in_flight: Option<Arc<SingleFlight>>,
}

impl CacheEngine {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend,
               in_flight: Some(Arc::new(SingleFlight::new())) }
    }

    /// Engine sobre un backend en memoria.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCacheBackend::new()))
    }

    /// Desactiva la deduplicación en proceso: dos llamadas concurrentes con el
    /// mismo fingerprint pueden invocar `compute` ambas.
    pub fn without_single_flight(mut self) -> Self {
        self.in_flight = None;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn fingerprint<P>(operation: &str, payload: &P) -> Result<Fingerprint, CacheError>
        where P: Serialize + ?Sized
    {
        let body = serde_json::to_value(payload)?;
        Ok(Fingerprint::compute(operation, &body))
    }

    /// Prefijo de entrada (fingerprint en texto) para `(operation, payload)`.
    pub fn prefix_for<P>(operation: &str, payload: &P) -> Result<String, CacheError>
        where P: Serialize + ?Sized
    {
        Ok(Self::fingerprint(operation, payload)?.to_string())
    }

    /// Ubicación de un companion derivada sólo de `(operation, payload, suffix)`.
    pub fn companion_location<P>(&self, operation: &str, payload: &P, suffix: &str) -> Result<PathBuf, CacheError>
        where P: Serialize + ?Sized
    {
        let fp = Self::fingerprint(operation, payload)?;
        Ok(self.backend.companion_location(fp.as_str(), suffix))
    }

    pub fn entry_location<P>(&self, operation: &str, payload: &P) -> Result<PathBuf, CacheError>
        where P: Serialize + ?Sized
    {
        let fp = Self::fingerprint(operation, payload)?;
        Ok(self.backend.entry_location(fp.as_str()))
    }

    /// Devuelve el resultado almacenado para `(operation, payload)` o invoca
    /// `compute` exactamente una vez y persiste una nueva entrada.
    pub async fn get_or_compute<P, T, E, F, Fut>(&self,
                                                 operation: &str,
                                                 payload: &P,
                                                 compute: F)
                                                 -> Result<Cached<T>, E>
        where P: Serialize + ?Sized,
              T: Serialize + DeserializeOwned,
              E: From<CacheError>,
              F: FnOnce(CompanionWriter) -> Fut,
              Fut: Future<Output = Result<T, E>>
    {
        let body = serde_json::to_value(payload).map_err(CacheError::from)?;
        let prefix = Fingerprint::compute(operation, &body).to_string();

        if let Some(data) = self.lookup::<T>(operation, &prefix).await {
            return Ok(Cached { prefix, data, hit: true });
        }

        let _flight = match &self.in_flight {
            Some(table) => {
                let guard = table.acquire(&prefix).await;
                // Otra llamada pudo completar mientras esperábamos el lock.
                if let Some(data) = self.lookup::<T>(operation, &prefix).await {
                    return Ok(Cached { prefix, data, hit: true });
                }
                Some(guard)
            }
            None => None,
        };

        debug!("cache miss op={operation} prefix={prefix}");
        let writer = CompanionWriter { backend: Arc::clone(&self.backend),
                                       prefix: prefix.clone() };
        let data = compute(writer).await?;
        self.persist(operation, body, &prefix, &data).await;
        Ok(Cached { prefix, data, hit: false })
    }

    async fn lookup<T: DeserializeOwned>(&self, operation: &str, prefix: &str) -> Option<T> {
        let bytes = match self.backend.read_entry(prefix).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("cache read failed op={operation} prefix={prefix}: {e} -> recompute");
                return None;
            }
        };
        match serde_json::from_slice::<CacheEntry<T>>(&bytes) {
            Ok(entry) => {
                debug!("cache hit op={operation} prefix={prefix}");
                Some(entry.api_response)
            }
            Err(e) => {
                warn!("corrupt cache entry op={operation} prefix={prefix}: {e} -> recompute");
                None
            }
        }
    }

    async fn persist<T: Serialize>(&self, operation: &str, body: Value, prefix: &str, data: &T) {
        let entry = CacheEntry { api_url: operation.to_string(),
                                 api_call_body: body,
                                 api_response: data,
                                 call_timestamp: Utc::now() };
        let written = match serde_json::to_vec_pretty(&entry) {
            Ok(bytes) => self.backend.write_entry(prefix, &bytes).await,
            Err(e) => Err(CacheError::from(e)),
        };
        if let Err(e) = written {
            warn!("cache write failed op={operation} prefix={prefix}: {e}");
        }
    }
}
