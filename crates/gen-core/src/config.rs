//! Configuración cerrada de un run.
//!
//! Cada stage declara un `ConfigSchema` (claves requeridas y opcionales). El
//! `RunConfig` se construye capturando únicamente las claves declaradas y se
//! valida completo al inicio del run, antes de cualquier llamada externa.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSchema {
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
}

impl ConfigSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn require(mut self, key: &'static str) -> Self {
        self.required.push(key);
        self
    }

    pub fn optional(mut self, key: &'static str) -> Self {
        self.optional.push(key);
        self
    }

    /// Une dos esquemas sin duplicar claves.
    pub fn merge(mut self, other: ConfigSchema) -> Self {
        for k in other.required {
            if !self.required.contains(&k) {
                self.required.push(k);
            }
        }
        for k in other.optional {
            if !self.optional.contains(&k) {
                self.optional.push(k);
            }
        }
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required.iter().chain(self.optional.iter()).copied()
    }

    /// Falla con la primera clave requerida ausente o vacía.
    pub fn validate(&self, stage: &str, config: &RunConfig) -> Result<(), ConfigError> {
        for key in &self.required {
            config.require(stage, key)?;
        }
        Ok(())
    }
}

/// Mapa cerrado de opciones nombradas, pasado por valor al orquestador.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    values: BTreeMap<String, String>,
}

impl RunConfig {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
        where I: IntoIterator<Item = (K, V)>,
              K: Into<String>,
              V: Into<String>
    {
        Self { values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Captura sólo las claves declaradas por `schemas` usando `lookup`.
    pub fn from_lookup<'a, S, F>(schemas: S, mut lookup: F) -> Self
        where S: IntoIterator<Item = &'a ConfigSchema>,
              F: FnMut(&str) -> Option<String>
    {
        let mut values = BTreeMap::new();
        for schema in schemas {
            for key in schema.keys() {
                if let Some(v) = lookup(key) {
                    values.insert(key.to_string(), v);
                }
            }
        }
        Self { values }
    }

    /// Igual que `from_lookup` leyendo variables de entorno del proceso.
    pub fn from_env<'a, S>(schemas: S) -> Self
        where S: IntoIterator<Item = &'a ConfigSchema>
    {
        Self::from_lookup(schemas, |k| std::env::var(k).ok())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn require(&self, stage: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey { stage: stage.to_string(),
                                                              key: key.to_string() })
    }

    /// Parsea una clave opcional; ausente ⇒ `default`.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError>
        where T::Err: std::fmt::Display
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid { key: key.to_string(),
                                                                                 reason: e.to_string() }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Opciones propias del orquestador (no visibles para los stages).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Techo de tareas de fan-out simultáneas; `None` = sin límite.
    pub fan_out_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_lookup_captures_only_declared_keys() {
        let schema = ConfigSchema::empty().require("TTS_KEY").optional("VOICE");
        let cfg = RunConfig::from_lookup([&schema], |k| Some(format!("v-{k}")));
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.get("TTS_KEY"), Some("v-TTS_KEY"));
        assert_eq!(cfg.get("OTHER"), None);
    }

    #[test]
    fn missing_required_key_is_reported_with_stage() {
        let schema = ConfigSchema::empty().require("FAL_KEY");
        let cfg = RunConfig::from_pairs([("FAL_KEY", "")]);
        assert_eq!(schema.validate("clips", &cfg),
                   Err(ConfigError::MissingKey { stage: "clips".into(),
                                                 key: "FAL_KEY".into() }));
    }

    #[test]
    fn parse_or_defaults_and_rejects_garbage() {
        let cfg = RunConfig::from_pairs([("N", "x")]);
        assert_eq!(cfg.parse_or("ABSENT", 3u32), Ok(3));
        assert!(matches!(cfg.parse_or("N", 3u32), Err(ConfigError::Invalid { .. })));
    }
}
