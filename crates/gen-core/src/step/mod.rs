//! Contratos de stages.
//!
//! Un stage es una unidad de trabajo externo (posiblemente cacheado). Este
//! módulo define:
//! - `StageDefinition`: stage secuencial, branch o merge.
//! - `SelectionDefinition`: stage inicial que produce candidatos.
//! - `FanOutDefinition`: planificación y ejecución de Segment Tasks.
//! - `StageContext` / `StageInputs`: lo que recibe cada stage.
//! - `TaskTable`: estado por tarea del fan-out.

mod context;
mod definition;
pub mod macros;
mod run_result;
mod status;

pub use context::{RunParams, StageContext, StageInputs, TaskContext};
pub use definition::{FanOutDefinition, RunFile, RunFileContents, SelectionDefinition, StageDefinition, StageKind};
pub use run_result::{StageOutput, StageRunResult};
pub use status::{TaskOutcome, TaskStatus, TaskTable};
