//! gen-persistence
//!
//! Implementaciones en disco de los contratos de almacenamiento del core.
//!
//! Módulos:
//! - `fs`: `FsCacheBackend` (entradas `<prefix>.json` y companions
//!   `<prefix><suffix>` en un directorio plano) y `RunDirectory` (un
//!   subdirectorio por run con los archivos publicados por los stages).
//! - `config`: carga de rutas desde variables de entorno / `.env`.
//! - `error`: errores de IO con la ruta involucrada.

pub mod config;
pub mod error;
pub mod fs;

pub use config::{init_dotenv, StoreConfig};
pub use error::PersistenceError;
pub use fs::{FsCacheBackend, RunDirectory};
