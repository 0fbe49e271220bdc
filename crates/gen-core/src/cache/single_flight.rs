use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Tabla de locks por fingerprint: dentro de un proceso, a lo sumo un
/// `compute` en vuelo por clave. Independiente de la persistencia entre runs.
///
/// Una clave sólo vive en la tabla mientras alguien la retiene o la espera.
#[derive(Debug, Default)]
pub struct SingleFlight {
    locks: Arc<LockTable>,
}

/// Mantiene la clave reservada mientras vive.
#[derive(Debug)]
pub struct FlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockTable>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> FlightGuard {
        // El RefMut de dashmap se libera antes del await.
        let lock = Arc::clone(self.locks.entry(key.to_string()).or_default().value());
        FlightGuard { guard: Some(lock.lock_owned().await),
                      key: key.to_string(),
                      locks: Arc::clone(&self.locks) }
    }

    /// Claves retenidas o esperadas en este momento.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Sólo la tabla referencia el lock: nadie lo retiene ni lo espera.
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
