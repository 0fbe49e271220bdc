//! Builder para `PipelineEngine`.
//!
//! Impone en tipos el orden de la topología:
//! `select` (checkpoint de candidatos) → `then`* (stages secuenciales) →
//! `join` (fan-out ‖ branch) → `merge` (stage terminal).
//!
//! ```ignore
//! let engine = PipelineEngine::builder(cache)
//!     .select(CandidatesStage::new(gen.clone()))
//!     .then(NarrativeStage::new(gen.clone()))
//!     .join(SegmentClips::new(gen.clone()), MusicBranch::new(gen.clone()))
//!     .merge(MergeStage::new(gen))
//!     .build();
//! ```

use std::sync::Arc;

use super::core::{PipelineDefinition, PipelineEngine};
use super::output::{InMemoryRunOutput, RunOutput};
use crate::cache::CacheEngine;
use crate::config::EngineOptions;
use crate::event::{EventStore, InMemoryEventStore};
use crate::step::{FanOutDefinition, SelectionDefinition, StageDefinition};

/// Estado inicial: stores y opciones, todavía sin stages.
#[derive(Debug)]
pub struct PipelineBuilderInit<E: EventStore> {
    cache: CacheEngine,
    events: Arc<E>,
    output: Arc<dyn RunOutput>,
    options: EngineOptions,
}

/// Selección declarada; acepta stages secuenciales.
#[derive(Debug)]
pub struct PipelineBuilder<E: EventStore> {
    init: PipelineBuilderInit<E>,
    selection: Arc<dyn SelectionDefinition>,
    stages: Vec<Arc<dyn StageDefinition>>,
}

/// Punto de sincronización declarado; falta el merge.
#[derive(Debug)]
pub struct JoinedBuilder<E: EventStore> {
    inner: PipelineBuilder<E>,
    fan_out: Arc<dyn FanOutDefinition>,
    branch: Arc<dyn StageDefinition>,
}

/// Pipeline completo, listo para `build`.
#[derive(Debug)]
pub struct MergedBuilder<E: EventStore> {
    init: PipelineBuilderInit<E>,
    definition: PipelineDefinition,
}

impl PipelineEngine<InMemoryEventStore> {
    /// Builder con event store y salida en memoria.
    pub fn builder(cache: CacheEngine) -> PipelineBuilderInit<InMemoryEventStore> {
        PipelineBuilderInit { cache,
                              events: Arc::new(InMemoryEventStore::default()),
                              output: Arc::new(InMemoryRunOutput::new()),
                              options: EngineOptions::default() }
    }
}

impl<E: EventStore> PipelineEngine<E> {
    /// Crea el engine a partir de una definición ya construida.
    pub fn from_definition(definition: PipelineDefinition,
                           cache: CacheEngine,
                           events: Arc<E>,
                           output: Arc<dyn RunOutput>,
                           options: EngineOptions)
                           -> Self {
        Self { definition,
               cache,
               events,
               output,
               options }
    }
}

impl<E: EventStore> PipelineBuilderInit<E> {
    pub fn with_event_store<E2: EventStore>(self, events: Arc<E2>) -> PipelineBuilderInit<E2> {
        PipelineBuilderInit { cache: self.cache,
                              events,
                              output: self.output,
                              options: self.options }
    }

    pub fn with_output(mut self, output: Arc<dyn RunOutput>) -> Self {
        self.output = output;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn select<S>(self, selection: S) -> PipelineBuilder<E>
        where S: SelectionDefinition + 'static
    {
        PipelineBuilder { init: self,
                          selection: Arc::new(selection),
                          stages: Vec::new() }
    }
}

impl<E: EventStore> PipelineBuilder<E> {
    /// Agrega un stage secuencial (consume los outputs acumulados).
    pub fn then<S>(mut self, stage: S) -> Self
        where S: StageDefinition + 'static
    {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn join<F, B>(self, fan_out: F, branch: B) -> JoinedBuilder<E>
        where F: FanOutDefinition + 'static,
              B: StageDefinition + 'static
    {
        JoinedBuilder { inner: self,
                        fan_out: Arc::new(fan_out),
                        branch: Arc::new(branch) }
    }
}

impl<E: EventStore> JoinedBuilder<E> {
    pub fn merge<M>(self, merge: M) -> MergedBuilder<E>
        where M: StageDefinition + 'static
    {
        let definition = PipelineDefinition::new(self.inner.selection,
                                                 self.inner.stages,
                                                 self.fan_out,
                                                 self.branch,
                                                 Arc::new(merge));
        MergedBuilder { init: self.inner.init,
                        definition }
    }
}

impl<E: EventStore> MergedBuilder<E> {
    pub fn build(self) -> PipelineEngine<E> {
        PipelineEngine::from_definition(self.definition,
                                        self.init.cache,
                                        self.init.events,
                                        self.init.output,
                                        self.init.options)
    }
}
