//! Orquestador del pipeline.
//!
//! - `PipelineEngine`: ejecuta un run (selección → stages secuenciales →
//!   fan-out ‖ branch → merge).
//! - `PipelineBuilder`: construcción en orden obligatorio de la topología.
//! - `RunOutput`: destino de los archivos del run.

mod builder;
mod core;
mod fan_out;
mod output;

pub use self::core::{PipelineDefinition, PipelineEngine, RunOutcome, RunReport, RunRequest};
pub use builder::{JoinedBuilder, MergedBuilder, PipelineBuilder, PipelineBuilderInit};
pub use output::{InMemoryRunOutput, RunOutput, RunSink};
