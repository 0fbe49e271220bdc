//! Core PipelineEngine implementation

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use serde_json::{json, Value};
use uuid::Uuid;

use super::fan_out::settle_all;
use super::output::{RunOutput, RunSink};
use crate::cache::CacheEngine;
use crate::config::{ConfigSchema, EngineOptions, RunConfig};
use crate::constants::{CANDIDATE_FILE, ENGINE_VERSION, SEED_FILE, SELECTED_CANDIDATE};
use crate::errors::{FanOutFailure, PipelineError, StageError, TaskFailure, TaskId};
use crate::event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
use crate::hashing::hash_value;
use crate::model::{Artifact, RunStats};
use crate::step::{FanOutDefinition, RunFile, RunParams, SelectionDefinition, StageContext, StageDefinition, StageInputs,
                  StageOutput, StageRunResult, TaskTable};

/// Topología inmutable de un pipeline.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    pub selection: Arc<dyn SelectionDefinition>,
    pub stages: Vec<Arc<dyn StageDefinition>>,
    pub fan_out: Arc<dyn FanOutDefinition>,
    pub branch: Arc<dyn StageDefinition>,
    pub merge: Arc<dyn StageDefinition>,
    pub definition_hash: String,
}

impl PipelineDefinition {
    pub fn new(selection: Arc<dyn SelectionDefinition>,
               stages: Vec<Arc<dyn StageDefinition>>,
               fan_out: Arc<dyn FanOutDefinition>,
               branch: Arc<dyn StageDefinition>,
               merge: Arc<dyn StageDefinition>)
               -> Self {
        let ids: Vec<&str> = std::iter::once(selection.id()).chain(stages.iter().map(|s| s.id()))
                                                            .chain([fan_out.id(), branch.id(), merge.id()])
                                                            .collect();
        let definition_hash = hash_value(&json!(ids));
        Self { selection,
               stages,
               fan_out,
               branch,
               merge,
               definition_hash }
    }

    /// Esquemas de configuración de todos los stages, en orden de ejecución.
    pub fn config_schemas(&self) -> Vec<(String, ConfigSchema)> {
        let mut out = vec![(self.selection.id().to_string(), self.selection.config_schema())];
        out.extend(self.stages.iter().map(|s| (s.id().to_string(), s.config_schema())));
        out.push((self.fan_out.id().to_string(), self.fan_out.config_schema()));
        out.push((self.branch.id().to_string(), self.branch.config_schema()));
        out.push((self.merge.id().to_string(), self.merge.config_schema()));
        out
    }

    /// Valida la configuración completa antes de ejecutar nada.
    pub fn validate(&self, config: &RunConfig) -> Result<(), PipelineError> {
        for (stage_id, schema) in self.config_schemas() {
            schema.validate(&stage_id, config)?;
        }
        Ok(())
    }
}

/// Parámetros de un run: semilla determinista y candidato elegido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub seed: u64,
    pub choice: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub label: String,
    pub location: PathBuf,
    /// Artifact terminal producido por el stage de merge.
    pub merged: Artifact,
    pub run_fingerprint: String,
    pub stats: RunStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No se indicó candidato: el run se detiene tras la selección.
    AwaitingChoice {
        run_id: Uuid,
        candidates: Vec<Value>,
        stats: RunStats,
    },
    Completed(RunReport),
}

/// Motor de ejecución de runs.
///
/// Responsable de secuenciar stages dependientes, ejecutar el fan-out y el
/// branch de forma concurrente, aplicar el join settle-all y decidir el éxito
/// del run. No reintenta ni cancela tareas.
#[derive(Debug)]
pub struct PipelineEngine<E = InMemoryEventStore>
    where E: EventStore
{
    pub(crate) definition: PipelineDefinition,
    pub(crate) cache: CacheEngine,
    pub(crate) events: Arc<E>,
    pub(crate) output: Arc<dyn RunOutput>,
    pub(crate) options: EngineOptions,
}

/// Estado en memoria de un run en curso (propiedad del engine).
struct RunState {
    run_id: Uuid,
    params: RunParams,
    config: Arc<RunConfig>,
    inputs: StageInputs,
    stats: RunStats,
    hashes: Vec<String>,
}

impl RunState {
    fn context(&self, cache: &CacheEngine) -> StageContext {
        StageContext { cache: cache.clone(),
                       config: Arc::clone(&self.config),
                       inputs: Arc::new(self.inputs.clone()),
                       run: self.params }
    }

    fn accept(&mut self, stage_id: &str, output: StageOutput) {
        self.hashes.push(output.artifact.hash.clone());
        self.stats.merge(output.stats);
        self.inputs.insert(stage_id, output.artifact);
    }
}

impl<E> PipelineEngine<E> where E: EventStore + 'static
{
    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn cache(&self) -> &CacheEngine {
        &self.cache
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    pub fn events(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.events.list(run_id)
    }

    /// Secuencia compacta de eventos de un run.
    pub fn event_variants(&self, run_id: Uuid) -> Vec<&'static str> {
        self.events.list(run_id).iter().map(|e| e.kind.variant_code()).collect()
    }

    /// Ejecuta un run completo.
    ///
    /// Una falla en un stage secuencial aborta de inmediato. Las fallas del
    /// fan-out o del branch se reportan recién cuando todas las tareas del join
    /// son terminales, como un único `PipelineError::FanOut`.
    pub async fn run(&self, request: RunRequest, config: RunConfig) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        self.emit(run_id,
                  RunEventKind::RunInitialized { definition_hash: self.definition.definition_hash.clone(),
                                                 seed: request.seed,
                                                 choice: request.choice });
        let res = self.drive(run_id, request, config).await;
        match &res {
            Ok(RunOutcome::Completed(report)) => info!("run {run_id} completed at {}", report.location.display()),
            Ok(RunOutcome::AwaitingChoice { candidates, .. }) => {
                info!("run {run_id} awaiting choice among {} candidates", candidates.len())
            }
            Err(e) => {
                warn!("run {run_id} failed: {e}");
                self.emit(run_id, RunEventKind::RunFailed { reason: e.to_string() });
            }
        }
        res
    }

    async fn drive(&self, run_id: Uuid, request: RunRequest, config: RunConfig) -> Result<RunOutcome, PipelineError> {
        self.definition.validate(&config)?;

        let mut state = RunState { run_id,
                                   params: RunParams { seed: request.seed,
                                                       choice: request.choice },
                                   config: Arc::new(config),
                                   inputs: StageInputs::default(),
                                   stats: RunStats::default(),
                                   hashes: Vec::new() };

        // 1. Selección + checkpoint humano
        let selection = Arc::clone(&self.definition.selection);
        let selected = self.run_stage(run_id, selection.as_ref(), state.context(&self.cache)).await?;
        let candidates = selection.candidates(&selected.artifact)
                                  .map_err(|error| PipelineError::Stage { stage_id: selection.id().to_string(),
                                                                          error })?;
        state.accept(selection.id(), selected);
        if candidates.is_empty() {
            return Err(PipelineError::NoCandidates(selection.id().to_string()));
        }
        let Some(choice) = request.choice else {
            self.emit(run_id, RunEventKind::AwaitingChoice { candidates: candidates.len() });
            return Ok(RunOutcome::AwaitingChoice { run_id,
                                                   candidates,
                                                   stats: state.stats });
        };
        let candidate = candidates.get(choice)
                                  .cloned()
                                  .ok_or(PipelineError::InvalidChoice { choice,
                                                                        available: candidates.len() })?;
        let label = format!("{choice:03} {}", selection.label(&candidate));
        let sink = self.output.open(&label).await?;
        sink.write(&RunFile::json(CANDIDATE_FILE, candidate.clone())).await?;
        sink.write(&RunFile::json(SEED_FILE, json!(request.seed))).await?;
        state.inputs.insert(SELECTED_CANDIDATE, Artifact::json(candidate));

        // 2. Stages secuenciales estrictamente ordenados
        for stage in &self.definition.stages {
            let output = self.run_stage(run_id, stage.as_ref(), state.context(&self.cache)).await?;
            write_all(sink.as_ref(), stage.exports(&output.artifact)).await?;
            state.accept(stage.id(), output);
        }

        // 3. Punto de sincronización: fan-out ‖ branch, barrera settle-all
        let (segments, branch) = self.join(&state, sink.as_ref()).await?;
        state.inputs.set_segments(segments.iter().map(|s| s.artifact.clone()).collect());
        for seg in segments {
            state.hashes.push(seg.artifact.hash);
            state.stats.merge(seg.stats);
        }
        state.accept(self.definition.branch.id(), branch);

        // 4. Merge terminal
        let merge = Arc::clone(&self.definition.merge);
        let merged = self.run_stage(run_id, merge.as_ref(), state.context(&self.cache)).await?;
        write_all(sink.as_ref(), merge.exports(&merged.artifact)).await?;
        let merged_artifact = merged.artifact.clone();
        state.accept(merge.id(), merged);

        let run_fingerprint = hash_value(&json!({
                                             "engine_version": ENGINE_VERSION,
                                             "definition_hash": &self.definition.definition_hash,
                                             "output_hashes": &state.hashes,
                                         }));
        self.emit(run_id, RunEventKind::RunCompleted { run_fingerprint: run_fingerprint.clone() });
        Ok(RunOutcome::Completed(RunReport { run_id,
                                             label,
                                             location: sink.location(),
                                             merged: merged_artifact,
                                             run_fingerprint,
                                             stats: state.stats }))
    }

    /// Lanza fan-out y branch a la vez y espera a que ambos sean terminales.
    async fn join(&self,
                  state: &RunState,
                  sink: &dyn RunSink)
                  -> Result<(Vec<StageOutput>, StageOutput), PipelineError> {
        let fan_out = Arc::clone(&self.definition.fan_out);
        let branch = Arc::clone(&self.definition.branch);
        let ctx = state.context(&self.cache);

        let plan = fan_out.plan(&state.inputs, &state.config)
                          .map_err(|error| PipelineError::Stage { stage_id: fan_out.id().to_string(),
                                                                  error })?;
        let shared = Arc::new(Mutex::new(TaskTable::new(plan.len())));
        debug!("join: {} segment tasks + branch '{}' (limit={:?})",
               plan.len(),
               branch.id(),
               self.options.fan_out_limit);

        let (settled, branch_res) = tokio::join!(settle_all(Arc::clone(&fan_out),
                                                            ctx.clone(),
                                                            plan,
                                                            self.options.fan_out_limit,
                                                            Arc::clone(&shared),
                                                            Arc::clone(&self.events),
                                                            state.run_id),
                                                 self.run_branch(state.run_id, branch.as_ref(), ctx));

        let mut table = std::mem::replace(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner),
                                          TaskTable::new(0));
        let mut segment_stats = Vec::with_capacity(settled.len());
        for (index, res) in settled.into_iter().enumerate() {
            match res {
                Ok(StageOutput { mut artifact, stats }) => {
                    artifact.hash = hash_value(&artifact.payload);
                    segment_stats.push(stats);
                    table.settle(index, Ok(artifact))?;
                }
                Err(e) => {
                    warn!("segment task {}[{index}] failed: {e}", fan_out.id());
                    table.settle(index, Err(e))?;
                }
            }
        }
        if !table.all_terminal() {
            return Err(PipelineError::Internal("join barrier released with running tasks".into()));
        }

        let mut failures: Vec<TaskFailure> = table.failures()
                                                  .into_iter()
                                                  .map(|(index, error)| TaskFailure { task: TaskId::Segment { fan_out_id: fan_out.id().to_string(),
                                                                                                              index },
                                                                                      error })
                                                  .collect();
        let total = table.len() + 1;
        let branch_out = match branch_res {
            Ok(out) => {
                write_all(sink, branch.exports(&out.artifact)).await?;
                Some(out)
            }
            Err(error) => {
                failures.push(TaskFailure { task: TaskId::Branch { stage_id: branch.id().to_string() },
                                            error });
                None
            }
        };
        self.emit(state.run_id,
                  RunEventKind::JoinSettled { succeeded: total - failures.len(),
                                              failed: failures.len() });

        match (table.into_outputs(), branch_out) {
            (Some(artifacts), Some(branch_out)) if failures.is_empty() => {
                write_all(sink, fan_out.exports(&artifacts)).await?;
                let segments = artifacts.into_iter()
                                        .zip(segment_stats)
                                        .map(|(artifact, stats)| StageOutput { artifact, stats })
                                        .collect();
                Ok((segments, branch_out))
            }
            _ => Err(FanOutFailure { total, failures }.into()),
        }
    }

    async fn run_branch(&self,
                        run_id: Uuid,
                        branch: &dyn StageDefinition,
                        ctx: StageContext)
                        -> Result<StageOutput, StageError> {
        self.run_stage(run_id, branch, ctx).await.map_err(|e| match e {
                                                     PipelineError::Stage { error, .. } => error,
                                                     other => StageError::Aborted(other.to_string()),
                                                 })
    }

    async fn run_stage<S>(&self, run_id: Uuid, stage: &S, ctx: StageContext) -> Result<StageOutput, PipelineError>
        where S: StageDefinition + ?Sized
    {
        let stage_id = stage.id().to_string();
        self.emit(run_id, RunEventKind::StageStarted { stage_id: stage_id.clone() });
        debug!("stage '{stage_id}' started");
        match stage.run(ctx).await {
            StageRunResult::Success { mut output } => {
                output.artifact.hash = hash_value(&output.artifact.payload);
                self.emit(run_id,
                          RunEventKind::StageFinished { stage_id: stage_id.clone(),
                                                        output_hash: output.artifact.hash.clone() });
                debug!("stage '{stage_id}' finished hash={}", output.artifact.hash);
                Ok(output)
            }
            StageRunResult::Failure { error } => {
                self.emit(run_id,
                          RunEventKind::StageFailed { stage_id: stage_id.clone(),
                                                      error: error.clone() });
                warn!("stage '{stage_id}' failed: {error}");
                Err(PipelineError::Stage { stage_id, error })
            }
        }
    }

    fn emit(&self, run_id: Uuid, kind: RunEventKind) {
        let _ = self.events.append_kind(run_id, kind);
    }
}

async fn write_all(sink: &dyn RunSink, files: Vec<RunFile>) -> Result<(), PipelineError> {
    for file in files {
        sink.write(&file).await?;
    }
    Ok(())
}
