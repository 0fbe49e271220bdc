use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use gen_core::{OutputError, RunFile, RunFileContents, RunOutput, RunSink};
use log::debug;
use tokio::fs;

use crate::config::StoreConfig;
use crate::error::PersistenceError;

/// Directorio padre de los runs: `<root>/<label>/<archivo>`.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.runs_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ruta del directorio de un run; el label debe ser un único componente.
    pub fn run_path(&self, label: &str) -> Result<PathBuf, PersistenceError> {
        let mut components = Path::new(label).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(label)),
            _ => Err(PersistenceError::InvalidLabel(label.to_string())),
        }
    }
}

#[async_trait]
impl RunOutput for RunDirectory {
    async fn open(&self, label: &str) -> Result<Box<dyn RunSink>, OutputError> {
        let dir = self.run_path(label)?;
        fs::create_dir_all(&dir).await.map_err(|e| PersistenceError::io(&dir, e))?;
        debug!("run directory ready {}", dir.display());
        Ok(Box::new(RunDirectorySink { dir }))
    }
}

#[derive(Debug)]
struct RunDirectorySink {
    dir: PathBuf,
}

impl RunDirectorySink {
    async fn write_file(&self, file: &RunFile) -> Result<(), PersistenceError> {
        let target = self.dir.join(&file.name);
        let written = match &file.contents {
            RunFileContents::Text(text) => fs::write(&target, text).await,
            RunFileContents::Json(value) => fs::write(&target, serde_json::to_vec_pretty(value)?).await,
            RunFileContents::CopyFrom(source) => fs::copy(source, &target).await.map(|_| ()),
        };
        written.map_err(|e| PersistenceError::io(&target, e))
    }
}

#[async_trait]
impl RunSink for RunDirectorySink {
    async fn write(&self, file: &RunFile) -> Result<(), OutputError> {
        self.write_file(file).await?;
        debug!("run file written {}/{}", self.dir.display(), file.name);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.dir.clone()
    }
}
