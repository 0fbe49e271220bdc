//! gen-core: orquestador de pipelines de generación con cache
//! direccionada por contenido.
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod step;

pub use cache::{CacheBackend, CacheEngine, Cached, CompanionWriter, InMemoryCacheBackend};
pub use config::{ConfigSchema, EngineOptions, RunConfig};
pub use engine::{InMemoryRunOutput, PipelineDefinition, PipelineEngine, RunOutcome, RunOutput, RunReport, RunRequest,
                 RunSink};
pub use errors::{CacheError, ConfigError, FanOutFailure, OutputError, PipelineError, StageError, TaskFailure, TaskId};
pub use event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
pub use model::{Artifact, ArtifactKind, ArtifactSpec, Fingerprint, RunStats};
pub use step::{FanOutDefinition, RunFile, RunFileContents, RunParams, SelectionDefinition, StageContext, StageDefinition,
               StageInputs, StageKind, StageOutput, StageRunResult, TaskContext};
