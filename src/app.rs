//! Configuración de la aplicación y ensamblado del pipeline de video.
//!
//! Las rutas de los stores vienen de `gen-persistence::StoreConfig`; el resto
//! de opciones del proceso se leen aquí (después de cargar `.env`).

use std::env;
use std::sync::Arc;

use gen_adapters::{video_pipeline, MediaGenerator, ScriptedGenerator};
use gen_core::{CacheEngine, EngineOptions, PipelineEngine, RunConfig};
use gen_persistence::{init_dotenv, FsCacheBackend, RunDirectory, StoreConfig};

use crate::error::AppError;

pub const FAN_OUT_LIMIT_VAR: &str = "GENFLOW_FAN_OUT_LIMIT";
pub const GENERATOR_VAR: &str = "GENFLOW_GENERATOR";
pub const DEFAULT_GENERATOR: &str = "scripted";
/// Semilla fija para que las respuestas cacheadas se reutilicen entre runs.
pub const DEFAULT_SEED: u64 = 1352242560;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub options: EngineOptions,
    pub generator: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { store: StoreConfig::default(),
               options: EngineOptions::default(),
               generator: DEFAULT_GENERATOR.to_string() }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        init_dotenv();
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, AppError>
        where F: FnMut(&str) -> Option<String>
    {
        let store = StoreConfig::from_lookup(&mut lookup);
        let fan_out_limit = match lookup(FAN_OUT_LIMIT_VAR).filter(|v| !v.trim().is_empty()) {
            None => None,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(AppError::Config { key: FAN_OUT_LIMIT_VAR.to_string(),
                                                  reason: format!("'{raw}' no es un entero positivo") })
                }
                Ok(n) => Some(n),
            },
        };
        let generator = lookup(GENERATOR_VAR).filter(|v| !v.trim().is_empty())
                                             .unwrap_or_else(|| DEFAULT_GENERATOR.to_string());
        Ok(Self { store,
                  options: EngineOptions { fan_out_limit },
                  generator })
    }
}

/// Resuelve el generador por nombre.
pub fn select_generator(name: &str) -> Result<Arc<dyn MediaGenerator>, AppError> {
    match name {
        "scripted" => Ok(Arc::new(ScriptedGenerator::default())),
        other => Err(AppError::Config { key: GENERATOR_VAR.to_string(),
                                        reason: format!("generador desconocido '{other}'") }),
    }
}

/// Pipeline de video sobre la caché y el directorio de runs en disco.
pub fn assemble(config: &AppConfig, generator: Arc<dyn MediaGenerator>) -> PipelineEngine {
    let cache = CacheEngine::new(Arc::new(FsCacheBackend::from_config(&config.store)));
    let init = PipelineEngine::builder(cache).with_output(Arc::new(RunDirectory::from_config(&config.store)))
                                             .with_options(config.options.clone());
    video_pipeline(init, generator)
}

/// `RunConfig` con las claves que declaran los stages del engine.
pub fn run_config(engine: &PipelineEngine) -> RunConfig {
    let schemas = engine.definition().config_schemas();
    RunConfig::from_env(schemas.iter().map(|(_, schema)| schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl FnMut(&str) -> Option<String> + 'a {
        move |k: &str| pairs.iter().find(|(key, _)| *key == k).map(|(_, v)| v.to_string())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.options.fan_out_limit, None);
    }

    #[test]
    fn reads_fan_out_limit_and_store_paths() {
        let cfg = AppConfig::from_lookup(lookup(&[(FAN_OUT_LIMIT_VAR, "3"), ("GENFLOW_RUNS_DIR", "/tmp/runs")])).unwrap();
        assert_eq!(cfg.options.fan_out_limit, Some(3));
        assert_eq!(cfg.store.runs_dir, std::path::PathBuf::from("/tmp/runs"));
    }

    #[test]
    fn rejects_zero_or_garbage_limit() {
        for bad in ["0", "many"] {
            let err = AppConfig::from_lookup(lookup(&[(FAN_OUT_LIMIT_VAR, bad)])).unwrap_err();
            assert_eq!(err.exit_code(), 3);
        }
    }

    #[test]
    fn unknown_generator_is_a_config_error() {
        assert!(select_generator("scripted").is_ok());
        assert!(matches!(select_generator("sora"), Err(AppError::Config { .. })));
    }
}
