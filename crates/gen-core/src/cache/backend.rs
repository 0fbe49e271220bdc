use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::constants::ENTRY_SUFFIX;
use crate::errors::CacheError;

/// Almacenamiento de entradas de cache y companions.
///
/// Contrato:
/// - `read_entry` devuelve `Ok(None)` cuando no existe la entrada.
/// - Las escrituras no son transaccionales entre entrada y companions.
/// - `companion_location` es pura: sólo depende de `(prefix, suffix)`.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    async fn read_entry(&self, prefix: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn write_entry(&self, prefix: &str, contents: &[u8]) -> Result<(), CacheError>;

    async fn write_companion(&self, prefix: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf, CacheError>;

    fn companion_location(&self, prefix: &str, suffix: &str) -> PathBuf;

    fn entry_location(&self, prefix: &str) -> PathBuf {
        self.companion_location(prefix, ENTRY_SUFFIX)
    }
}

/// Backend en memoria (tests y ejecuciones efímeras).
#[derive(Default)]
pub struct InMemoryCacheBackend {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contenido de un archivo (entrada o companion) si existe.
    pub fn file(&self, location: &PathBuf) -> Option<Vec<u8>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).get(location).cloned()
    }

    /// Sobrescribe una entrada con bytes arbitrarios (simula corrupción).
    pub fn overwrite_entry(&self, prefix: &str, contents: &[u8]) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.entry_location(prefix), contents.to_vec());
    }

    pub fn entry_count(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|p| p.to_string_lossy().ends_with(ENTRY_SUFFIX))
            .count()
    }

    fn put(&self, location: PathBuf, contents: &[u8]) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, contents.to_vec());
    }
}

impl fmt::Debug for InMemoryCacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.files.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("InMemoryCacheBackend").field("files", &len).finish()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn read_entry(&self, prefix: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.file(&self.entry_location(prefix)))
    }

    async fn write_entry(&self, prefix: &str, contents: &[u8]) -> Result<(), CacheError> {
        self.put(self.entry_location(prefix), contents);
        Ok(())
    }

    async fn write_companion(&self, prefix: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf, CacheError> {
        let location = self.companion_location(prefix, suffix);
        self.put(location.clone(), contents);
        Ok(location)
    }

    fn companion_location(&self, prefix: &str, suffix: &str) -> PathBuf {
        PathBuf::from(format!("memory/{prefix}{suffix}"))
    }
}
