//! Cache Engine: persistencia read-through/write-through del resultado de
//! cualquier par (operación, payload).
//!
//! - `CacheBackend`: almacenamiento de entradas y companions (trait; la
//!   implementación en disco vive en `gen-persistence`).
//! - `CacheEngine::get_or_compute`: fingerprint → lookup → compute → persist.
//! - `CompanionWriter`: capacidad entregada al `compute` para escribir
//!   artifacts auxiliares bajo el prefijo de la entrada.
//! - `SingleFlight`: deduplicación en proceso por fingerprint.

mod backend;
mod engine;
mod entry;
mod single_flight;

pub use backend::{CacheBackend, InMemoryCacheBackend};
pub use engine::{CacheEngine, Cached, CompanionWriter};
pub use entry::CacheEntry;
pub use single_flight::{FlightGuard, SingleFlight};
