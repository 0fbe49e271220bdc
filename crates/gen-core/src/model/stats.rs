//! Acumulador explícito de estadísticas de un run.
//!
//! Cada stage devuelve su propio `RunStats` junto al Stage Result; el
//! orquestador los fusiona en orden. No hay contadores globales.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Uso facturable por servicio (caracteres, segundos, tokens...).
    pub usage: IndexMap<String, f64>,
}

impl RunStats {
    pub fn record_cache(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    pub fn add_usage(&mut self, key: &str, amount: f64) {
        *self.usage.entry(key.to_string()).or_insert(0.0) += amount;
    }

    pub fn merge(&mut self, other: RunStats) {
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        for (k, v) in other.usage {
            *self.usage.entry(k).or_insert(0.0) += v;
        }
    }
}
