//! Errores de persistencia.
//! Conserva la ruta afectada y se convierte a los errores del core
//! (`CacheError` para la cache, `OutputError` para los directorios de run).

use std::io;
use std::path::{Path, PathBuf};

use gen_core::{CacheError, OutputError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid run label '{0}'")]
    InvalidLabel(String),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(),
                   source }
    }

    fn target(&self) -> String {
        match self {
            Self::Io { path, .. } => path.display().to_string(),
            Self::InvalidLabel(label) => label.clone(),
            Self::Serde(_) => "json".to_string(),
        }
    }
}

impl From<PersistenceError> for CacheError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Io { path, source } => {
                CacheError::Io(io::Error::new(source.kind(), format!("{}: {source}", path.display())))
            }
            PersistenceError::Serde(e) => CacheError::Serde(e),
            other => CacheError::Internal(other.to_string()),
        }
    }
}

impl From<PersistenceError> for OutputError {
    fn from(err: PersistenceError) -> Self {
        OutputError { target: err.target(),
                      reason: err.to_string() }
    }
}
