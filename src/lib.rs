//! genflow
//!
//! Librería fina sobre los crates del workspace:
//! - `app`: configuración de la aplicación y ensamblado del pipeline con
//!   los stores en disco.
//! - `cli`: lectura de argumentos `genflow <choice> [--seed N]`.
//! - `error`: error de aplicación y códigos de salida.
//! - `logging`: inicialización de `tracing-subscriber`.

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;

pub use app::{assemble, run_config, select_generator, AppConfig, DEFAULT_SEED};
pub use cli::CliArgs;
pub use error::AppError;
