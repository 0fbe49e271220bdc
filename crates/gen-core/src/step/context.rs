use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::cache::CacheEngine;
use crate::config::RunConfig;
use crate::constants::SELECTED_CANDIDATE;
use crate::model::{Artifact, ArtifactError, ArtifactSpec};

/// Parámetros deterministas del run visibles para los stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub seed: u64,
    pub choice: Option<usize>,
}

/// Stage Results acumulados hasta el punto actual del run, en orden de
/// ejecución.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInputs {
    stages: IndexMap<String, Artifact>,
    segments: Vec<Artifact>,
}

impl StageInputs {
    pub fn insert(&mut self, stage_id: &str, artifact: Artifact) {
        self.stages.insert(stage_id.to_string(), artifact);
    }

    pub fn get(&self, stage_id: &str) -> Option<&Artifact> {
        self.stages.get(stage_id)
    }

    /// Decodifica el output de `stage_id` a su tipo concreto.
    pub fn typed<T: ArtifactSpec>(&self, stage_id: &str) -> Result<T, ArtifactError> {
        let a = self.get(stage_id).ok_or_else(|| ArtifactError::Missing(stage_id.to_string()))?;
        T::from_artifact(a)
    }

    /// Output del último stage ejecutado.
    pub fn previous(&self) -> Option<(&str, &Artifact)> {
        self.stages.last().map(|(k, v)| (k.as_str(), v))
    }

    /// Candidato elegido en el checkpoint humano.
    pub fn selected_candidate(&self) -> Option<&Value> {
        self.get(SELECTED_CANDIDATE).map(|a| &a.payload)
    }

    pub fn set_segments(&mut self, segments: Vec<Artifact>) {
        self.segments = segments;
    }

    /// Resultados ordenados del fan-out (vacío antes del join).
    pub fn segments(&self) -> &[Artifact] {
        &self.segments
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }
}

/// Lo que recibe un stage: capacidad de cache, configuración cerrada y
/// outputs previos. Clonar es barato (todo va detrás de `Arc`).
#[derive(Debug, Clone)]
pub struct StageContext {
    pub cache: CacheEngine,
    pub config: Arc<RunConfig>,
    pub inputs: Arc<StageInputs>,
    pub run: RunParams,
}

/// Contexto de una Segment Task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub stage: StageContext,
    pub index: usize,
    /// Input propio de la tarea, producido por `FanOutDefinition::plan`.
    pub input: Value,
}
