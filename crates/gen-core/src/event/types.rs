//! Tipos de evento del run y estructura `RunEvent`.
//!
//! Rol en el pipeline:
//! - El `PipelineEngine` emite eventos a un `EventStore` append-only mientras
//!   avanza el run (incluidas las tareas concurrentes del fan-out).
//! - El log permite verificar el orden de los stages y diagnosticar fallas
//!   parciales sin inspeccionar los Stage Results.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// Primer evento de un run.
    RunInitialized {
        definition_hash: String,
        seed: u64,
        choice: Option<usize>,
    },
    /// Un stage (secuencial, branch o merge) comenzó. No implica éxito.
    StageStarted { stage_id: String },
    /// Un stage terminó con su Stage Result (hash del payload).
    StageFinished { stage_id: String, output_hash: String },
    StageFailed { stage_id: String, error: StageError },
    /// El run se detuvo esperando la elección humana de candidato.
    AwaitingChoice { candidates: usize },
    /// Una tarea del fan-out obtuvo admisión y empezó a ejecutarse.
    TaskStarted { fan_out_id: String, index: usize },
    TaskSettled {
        fan_out_id: String,
        index: usize,
        succeeded: bool,
    },
    /// Barrera del join: todas las tareas (fan-out + branch) son terminales.
    JoinSettled { succeeded: usize, failed: usize },
    RunCompleted { run_fingerprint: String },
    RunFailed { reason: String },
}

impl RunEventKind {
    /// Letra compacta para resúmenes de secuencia.
    pub fn variant_code(&self) -> &'static str {
        match self {
            RunEventKind::RunInitialized { .. } => "I",
            RunEventKind::StageStarted { .. } => "S",
            RunEventKind::StageFinished { .. } => "F",
            RunEventKind::StageFailed { .. } => "X",
            RunEventKind::AwaitingChoice { .. } => "U",
            RunEventKind::TaskStarted { .. } => "T",
            RunEventKind::TaskSettled { .. } => "t",
            RunEventKind::JoinSettled { .. } => "J",
            RunEventKind::RunCompleted { .. } => "C",
            RunEventKind::RunFailed { .. } => "E",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64, // asignado por el store (orden append)
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}
