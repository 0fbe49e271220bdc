//! Errores del core.
//!
//! Taxonomía:
//! - `CacheError`: fallas de la capa de persistencia de cache. Nunca cruzan
//!   `get_or_compute` (se tratan como miss); sólo aparecen al escribir
//!   companions desde un `compute`.
//! - `StageError`: falla tipada de un stage (reemplaza strings centinela).
//! - `ConfigError`: configuración ausente/inválida, detectada antes de invocar
//!   cualquier stage.
//! - `PipelineError`: resultado de un run que no pudo completarse.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("companion suffix '{0}' is reserved for the cache entry")]
    ReservedSuffix(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("stage '{stage}' requires config key '{key}'")]
    MissingKey { stage: String, key: String },
    #[error("config key '{key}' is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

/// Falla tipada de un stage o de una tarea de fan-out.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum StageError {
    #[error("content refused by provider: {0}")]
    Refused(String),
    #[error("timed out after {attempts} attempts ({elapsed_ms} ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("external call failed: {0}")]
    External(String),
    #[error("invalid stage input: {0}")]
    InvalidInput(String),
    #[error("artifact error: {0}")]
    Artifact(String),
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl From<CacheError> for StageError {
    fn from(err: CacheError) -> Self {
        Self::Artifact(err.to_string())
    }
}

impl From<crate::model::ArtifactError> for StageError {
    fn from(err: crate::model::ArtifactError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Error escribiendo archivos del directorio de un run.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("run output '{target}': {reason}")]
pub struct OutputError {
    pub target: String,
    pub reason: String,
}

/// Identifica una tarea concurrente del punto de sincronización.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskId {
    /// Tarea `index` del fan-out `fan_out_id`.
    Segment { fan_out_id: String, index: usize },
    /// Branch paralelo (una sola tarea).
    Branch { stage_id: String },
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Segment { fan_out_id, index } => write!(f, "{fan_out_id}[{index}]"),
            TaskId::Branch { stage_id } => write!(f, "{stage_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskId,
    pub error: StageError,
}

/// Falla agregada del join: conserva el motivo de cada tarea fallida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutFailure {
    /// Tareas lanzadas en el join (fan-out + branch).
    pub total: usize,
    pub failures: Vec<TaskFailure>,
}

impl fmt::Display for FanOutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "at least one fan-out task failed ({} of {})",
               self.failures.len(),
               self.total)?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.task, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FanOutFailure {}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("stage '{stage_id}' failed: {error}")]
    Stage { stage_id: String, error: StageError },
    #[error("selection stage '{0}' produced no candidates")]
    NoCandidates(String),
    #[error("choice {choice} out of range ({available} candidates)")]
    InvalidChoice { choice: usize, available: usize },
    #[error(transparent)]
    FanOut(#[from] FanOutFailure),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("internal: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stage que originó la falla, si aplica.
    pub fn stage_id(&self) -> Option<&str> {
        match self {
            PipelineError::Stage { stage_id, .. } => Some(stage_id),
            _ => None,
        }
    }
}
