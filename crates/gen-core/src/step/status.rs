use crate::errors::{PipelineError, StageError};
use crate::model::Artifact;

/// Estado de una Segment Task.
///
/// Transiciones válidas:
/// - `Pending` -> `Running`
/// - `Running` -> `Succeeded`
/// - `Running` -> `Failed`
///
/// Los estados terminales son absorbentes; no hay reintentos automáticos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Pending,
    Running,
    Succeeded(Artifact),
    Failed(StageError),
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Pending => TaskStatus::Pending,
            TaskOutcome::Running => TaskStatus::Running,
            TaskOutcome::Succeeded(_) => TaskStatus::Succeeded,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_) | TaskOutcome::Failed(_))
    }
}

/// Tabla de outcomes del fan-out, propiedad exclusiva del orquestador.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTable {
    slots: Vec<TaskOutcome>,
}

impl TaskTable {
    pub fn new(len: usize) -> Self {
        Self { slots: vec![TaskOutcome::Pending; len] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status(&self, index: usize) -> Option<TaskStatus> {
        self.slots.get(index).map(TaskOutcome::status)
    }

    pub fn start(&mut self, index: usize) -> Result<(), PipelineError> {
        match self.slots.get_mut(index) {
            Some(slot @ TaskOutcome::Pending) => {
                *slot = TaskOutcome::Running;
                Ok(())
            }
            Some(other) => Err(PipelineError::Internal(format!("task {index} cannot start from {:?}", other.status()))),
            None => Err(PipelineError::Internal(format!("task {index} out of range"))),
        }
    }

    pub fn settle(&mut self, index: usize, result: Result<Artifact, StageError>) -> Result<(), PipelineError> {
        match self.slots.get_mut(index) {
            Some(slot @ TaskOutcome::Running) => {
                *slot = match result {
                    Ok(a) => TaskOutcome::Succeeded(a),
                    Err(e) => TaskOutcome::Failed(e),
                };
                Ok(())
            }
            Some(other) => Err(PipelineError::Internal(format!("task {index} cannot settle from {:?}", other.status()))),
            None => Err(PipelineError::Internal(format!("task {index} out of range"))),
        }
    }

    pub fn all_terminal(&self) -> bool {
        self.slots.iter().all(TaskOutcome::is_terminal)
    }

    /// `(index, error)` de cada tarea fallida, en orden.
    pub fn failures(&self) -> Vec<(usize, StageError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                TaskOutcome::Failed(e) => Some((i, e.clone())),
                _ => None,
            })
            .collect()
    }

    /// Resultados ordenados si todas las tareas terminaron con éxito.
    pub fn into_outputs(self) -> Option<Vec<Artifact>> {
        self.slots
            .into_iter()
            .map(|s| match s {
                TaskOutcome::Succeeded(a) => Some(a),
                _ => None,
            })
            .collect()
    }
}
