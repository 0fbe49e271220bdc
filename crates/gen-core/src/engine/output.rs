//! Directorio de salida de un run.
//!
//! El orquestador es dueño del directorio: lo abre tras el checkpoint de
//! selección y escribe allí los archivos que publica cada stage. La
//! implementación en disco (`RunDirectory`) vive en `gen-persistence`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::errors::OutputError;
use crate::step::{RunFile, RunFileContents};

#[async_trait]
pub trait RunOutput: Send + Sync + std::fmt::Debug {
    /// Crea (o reabre) el destino del run identificado por `label`.
    async fn open(&self, label: &str) -> Result<Box<dyn RunSink>, OutputError>;
}

#[async_trait]
pub trait RunSink: Send + Sync + std::fmt::Debug {
    async fn write(&self, file: &RunFile) -> Result<(), OutputError>;

    fn location(&self) -> PathBuf;
}

type Runs = Arc<Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>;

/// Salida en memoria: `label -> (nombre -> bytes)`. `CopyFrom` guarda la ruta
/// de origen como texto.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunOutput {
    runs: Runs,
}

impl InMemoryRunOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, label: &str, name: &str) -> Option<Vec<u8>> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .and_then(|files| files.get(name).cloned())
    }

    pub fn file_names(&self, label: &str) -> Vec<String> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }
}

#[async_trait]
impl RunOutput for InMemoryRunOutput {
    async fn open(&self, label: &str) -> Result<Box<dyn RunSink>, OutputError> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(label.to_string())
            .or_default();
        Ok(Box::new(InMemoryRunSink { runs: Arc::clone(&self.runs),
                                      label: label.to_string() }))
    }
}

#[derive(Debug)]
struct InMemoryRunSink {
    runs: Runs,
    label: String,
}

#[async_trait]
impl RunSink for InMemoryRunSink {
    async fn write(&self, file: &RunFile) -> Result<(), OutputError> {
        let bytes = match &file.contents {
            RunFileContents::Text(t) => t.clone().into_bytes(),
            RunFileContents::Json(v) => serde_json::to_vec_pretty(v).map_err(|e| OutputError { target: file.name.clone(),
                                                                                                reason: e.to_string() })?,
            RunFileContents::CopyFrom(p) => p.to_string_lossy().into_owned().into_bytes(),
        };
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(self.label.clone())
            .or_default()
            .insert(file.name.clone(), bytes);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from(format!("memory/{}", self.label))
    }
}
