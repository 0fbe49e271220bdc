//! Constantes del motor core.
//!
//! Agrupa valores estáticos que participan en el cálculo de fingerprints y en
//! el layout de un run. Cambiar `ENGINE_VERSION` invalida los fingerprints de
//! run (no los de cache, que dependen sólo de operación + payload).

/// Versión lógica del orquestador. Entra en el fingerprint agregado del run.
pub const ENGINE_VERSION: &str = "G1.0";

/// Cantidad de caracteres hex del digest SHA-256 que forman el prefijo de una
/// entrada de cache (16 hex ≈ 64 bits).
pub const FINGERPRINT_PREFIX_LEN: usize = 16;

/// Extensión del archivo de entrada de cache (`<prefix>.json`).
pub const ENTRY_SUFFIX: &str = ".json";

/// Clave bajo la cual el orquestador publica el candidato elegido en los
/// inputs acumulados.
pub const SELECTED_CANDIDATE: &str = "selected_candidate";

/// Archivo del run con el descriptor del candidato elegido.
pub const CANDIDATE_FILE: &str = "candidate.json";

/// Archivo del run con la semilla determinista.
pub const SEED_FILE: &str = "seed.json";
