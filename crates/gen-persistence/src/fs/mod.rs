//! Implementaciones sobre el sistema de archivos (tokio::fs).

mod cache_backend;
mod run_directory;

pub use cache_backend::FsCacheBackend;
pub use run_directory::RunDirectory;
