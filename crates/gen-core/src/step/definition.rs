use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::{StageContext, StageInputs, StageRunResult, TaskContext};
use crate::config::{ConfigSchema, RunConfig};
use crate::errors::StageError;
use crate::model::Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Selection,
    Sequential,
    FanOut,
    Branch,
    Merge,
}

/// Archivo que un stage publica en el directorio del run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFile {
    pub name: String,
    pub contents: RunFileContents,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunFileContents {
    Text(String),
    Json(Value),
    /// Copia de un archivo existente (típicamente un companion de cache).
    CopyFrom(PathBuf),
}

impl RunFile {
    pub fn text(name: &str, contents: impl Into<String>) -> Self {
        Self { name: name.to_string(),
               contents: RunFileContents::Text(contents.into()) }
    }

    pub fn json(name: &str, value: Value) -> Self {
        Self { name: name.to_string(),
               contents: RunFileContents::Json(value) }
    }

    pub fn copy(name: &str, from: impl Into<PathBuf>) -> Self {
        Self { name: name.to_string(),
               contents: RunFileContents::CopyFrom(from.into()) }
    }
}

/// Stage del pipeline. Implementaciones deben ser referencialmente
/// transparentes respecto a sus inputs declarados y canalizar todo trabajo
/// externo por `ctx.cache`.
#[async_trait]
pub trait StageDefinition: Send + Sync + Debug {
    /// Identificador estable y único dentro del pipeline.
    fn id(&self) -> &str;

    /// Nombre opcional amigable.
    fn name(&self) -> &str {
        self.id()
    }

    fn kind(&self) -> StageKind {
        StageKind::Sequential
    }

    /// Claves de configuración que el stage necesita.
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty()
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult;

    /// Archivos que el orquestador escribe en el directorio del run tras un
    /// éxito.
    fn exports(&self, _output: &Artifact) -> Vec<RunFile> {
        Vec::new()
    }
}

/// Stage inicial: genera candidatos entre los que se elige uno (checkpoint
/// humano) antes del resto del pipeline.
pub trait SelectionDefinition: StageDefinition {
    /// Extrae la lista de candidatos del Stage Result.
    fn candidates(&self, output: &Artifact) -> Result<Vec<Value>, StageError>;

    /// Etiqueta legible del candidato (forma parte del nombre del run).
    fn label(&self, candidate: &Value) -> String;
}

/// Conjunto de Segment Tasks independientes.
#[async_trait]
pub trait FanOutDefinition: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty()
    }

    /// Deriva el input de cada tarea a partir de los outputs acumulados.
    fn plan(&self, inputs: &StageInputs, config: &RunConfig) -> Result<Vec<Value>, StageError>;

    async fn run_task(&self, ctx: TaskContext) -> StageRunResult;

    /// Archivos del run a partir de los resultados ordenados (sólo si todas
    /// las tareas tuvieron éxito).
    fn exports(&self, _outputs: &[Artifact]) -> Vec<RunFile> {
        Vec::new()
    }
}
