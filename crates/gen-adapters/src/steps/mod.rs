//! Stages concretos del pipeline de video.
//!
//! Orden de ejecución:
//! `candidates` (selección) → `narrative` → `speech` → `segment_prompts` →
//! (`segment_clips` fan-out ‖ `music` branch) → `merge`.
//!
//! Todos envuelven cada llamada al `MediaGenerator` en
//! `CacheEngine::get_or_compute`; los archivos binarios viajan como
//! companions de la entrada y los Stage Results sólo guardan su ruta.

mod candidates;
mod merge;
mod music;
mod narrative;
mod segment_clips;
mod segment_prompts;
mod speech;

pub use candidates::CandidatesStage;
pub use merge::MergeStage;
pub use music::MusicBranch;
pub use narrative::NarrativeStage;
pub use segment_clips::SegmentClips;
pub use segment_prompts::SegmentPromptsStage;
pub use speech::SpeechStage;

use gen_core::{Cached, RunStats, StageContext, StageError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::artifacts::Candidate;

pub const CANDIDATES: &str = "candidates";
pub const NARRATIVE: &str = "narrative";
pub const SPEECH: &str = "speech";
pub const SEGMENT_PROMPTS: &str = "segment_prompts";
pub const SEGMENT_CLIPS: &str = "segment_clips";
pub const MUSIC: &str = "music";
pub const MERGE: &str = "merge";

/// Máximo de candidatos pedidos al generador.
pub const MAX_CANDIDATES: &str = "GENFLOW_MAX_CANDIDATES";
pub const DEFAULT_MAX_CANDIDATES: u32 = 40;
/// Silencio tras el fin de la voz (segundos).
pub const PAUSE_AFTER_SECONDS: &str = "GENFLOW_PAUSE_AFTER_SECONDS";

/// Registra hit/miss y, si hubo llamada real, el uso facturable.
fn account<T>(stats: &mut RunStats, cached: &Cached<T>, usage_key: &str, amount: f64) {
    stats.record_cache(cached.hit);
    if !cached.hit {
        stats.add_usage(usage_key, amount);
    }
}

/// Decodifica una respuesta JSON del generador.
fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, StageError> {
    serde_json::from_value(value).map_err(|e| StageError::External(format!("malformed {what} response: {e}")))
}

fn text_response(what: &str, value: Value) -> Result<String, StageError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        other => Err(StageError::External(format!("expected {what} text, got {other}"))),
    }
}

/// Candidato elegido en el checkpoint humano.
fn chosen_candidate(ctx: &StageContext) -> Result<Candidate, StageError> {
    let value = ctx.inputs
                   .selected_candidate()
                   .cloned()
                   .ok_or_else(|| StageError::InvalidInput("no candidate selected".into()))?;
    serde_json::from_value(value).map_err(|e| StageError::InvalidInput(format!("candidate: {e}")))
}

/// Ruta en disco de un companion de la entrada `prefix`.
fn companion_path(ctx: &StageContext, prefix: &str, suffix: &str) -> String {
    ctx.cache.backend().companion_location(prefix, suffix).to_string_lossy().into_owned()
}
