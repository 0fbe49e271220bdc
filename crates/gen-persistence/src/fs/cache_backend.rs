use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gen_core::{CacheBackend, CacheError};
use gen_core::constants::ENTRY_SUFFIX;
use log::debug;
use tempfile::Builder;
use tokio::{fs, task};

use crate::config::StoreConfig;
use crate::error::PersistenceError;

/// Store de cache en un directorio plano.
///
/// Layout: `<root>/<prefix>.json` para la entrada y `<root>/<prefix><suffix>`
/// para cada companion. Las entradas se escriben en un temporal de nombre
/// único (`<prefix>.json.<random>.tmp`) y se renombran, de modo que un lector
/// nunca observa una entrada a medio escribir y dos escritores sobre el mismo
/// directorio no comparten temporal.
#[derive(Debug, Clone)]
pub struct FsCacheBackend {
    root: PathBuf,
}

impl FsCacheBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.cache_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root).await.map_err(|e| PersistenceError::io(&self.root, e))
    }
}

fn persist_atomically(root: &Path, tmp_prefix: &str, target: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let mut tmp = Builder::new().prefix(tmp_prefix)
                                .suffix(".tmp")
                                .tempfile_in(root)
                                .map_err(|e| PersistenceError::io(root, e))?;
    tmp.write_all(contents).map_err(|e| PersistenceError::io(tmp.path(), e))?;
    tmp.persist(target).map_err(|e| PersistenceError::io(target, e.error))?;
    Ok(())
}

#[async_trait]
impl CacheBackend for FsCacheBackend {
    async fn read_entry(&self, prefix: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_location(prefix);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(&path, e).into()),
        }
    }

    async fn write_entry(&self, prefix: &str, contents: &[u8]) -> Result<(), CacheError> {
        self.ensure_root().await?;
        let path = self.entry_location(prefix);
        let (root, target, contents) = (self.root.clone(), path.clone(), contents.to_vec());
        let tmp_prefix = format!("{prefix}{ENTRY_SUFFIX}.");
        task::spawn_blocking(move || persist_atomically(&root, &tmp_prefix, &target, &contents))
            .await
            .map_err(|e| CacheError::Internal(format!("entry writer for {}: {e}", path.display())))??;
        debug!("cache entry written {}", path.display());
        Ok(())
    }

    async fn write_companion(&self, prefix: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf, CacheError> {
        self.ensure_root().await?;
        let path = self.companion_location(prefix, suffix);
        fs::write(&path, contents).await.map_err(|e| PersistenceError::io(&path, e))?;
        Ok(path)
    }

    fn companion_location(&self, prefix: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{prefix}{suffix}"))
    }
}
