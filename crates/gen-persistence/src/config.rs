//! Carga de configuración de almacenamiento desde variables de entorno.
//! Usa `GENFLOW_CACHE_DIR` y `GENFLOW_RUNS_DIR`, ambas opcionales.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

pub const CACHE_DIR_VAR: &str = "GENFLOW_CACHE_DIR";
pub const RUNS_DIR_VAR: &str = "GENFLOW_RUNS_DIR";
pub const DEFAULT_CACHE_DIR: &str = "./data/api-cache/";
pub const DEFAULT_RUNS_DIR: &str = "./data/videos/";

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directorio plano de entradas de cache y companions.
    pub cache_dir: PathBuf,
    /// Directorio padre de los directorios de run.
    pub runs_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
               runs_dir: PathBuf::from(DEFAULT_RUNS_DIR) }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Igual que `from_env` con una fuente arbitraria (valores vacíos se
    /// ignoran).
    pub fn from_lookup<F>(mut lookup: F) -> Self
        where F: FnMut(&str) -> Option<String>
    {
        let mut dir = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty())
                       .map(PathBuf::from)
                       .unwrap_or_else(|| PathBuf::from(default))
        };
        Self { cache_dir: dir(CACHE_DIR_VAR, DEFAULT_CACHE_DIR),
               runs_dir: dir(RUNS_DIR_VAR, DEFAULT_RUNS_DIR) }
    }

    /// Ambos directorios bajo una misma raíz (tests, ejecuciones aisladas).
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self { cache_dir: root.join("api-cache"),
               runs_dir: root.join("videos") }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_or_blank_values() {
        let cfg = StoreConfig::from_lookup(|k| (k == RUNS_DIR_VAR).then(|| "  ".to_string()));
        assert_eq!(cfg, StoreConfig::default());
    }

    #[test]
    fn explicit_values_win() {
        let cfg = StoreConfig::from_lookup(|k| match k {
                                               CACHE_DIR_VAR => Some("/tmp/c".into()),
                                               _ => None,
                                           });
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/c"));
        assert_eq!(cfg.runs_dir, PathBuf::from(DEFAULT_RUNS_DIR));
    }
}
