use crate::errors::StageError;
use crate::model::{Artifact, ArtifactSpec, RunStats};

/// Stage Result exitoso más las estadísticas que aporta al run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub artifact: Artifact,
    pub stats: RunStats,
}

impl StageOutput {
    pub fn new(artifact: Artifact, stats: RunStats) -> Self {
        Self { artifact, stats }
    }

    /// Empaqueta un artifact tipado.
    pub fn typed<T: ArtifactSpec>(value: T, stats: RunStats) -> Result<Self, StageError> {
        Ok(Self { artifact: value.into_artifact()?,
                  stats })
    }
}

/// Resultado abstracto de ejecutar un stage: éxito con valor o falla tipada.
#[derive(Debug, Clone, PartialEq)]
pub enum StageRunResult {
    Success { output: StageOutput },
    Failure { error: StageError },
}

impl StageRunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageRunResult::Success { .. })
    }

    pub fn into_result(self) -> Result<StageOutput, StageError> {
        match self {
            StageRunResult::Success { output } => Ok(output),
            StageRunResult::Failure { error } => Err(error),
        }
    }
}

impl From<Result<StageOutput, StageError>> for StageRunResult {
    fn from(res: Result<StageOutput, StageError>) -> Self {
        match res {
            Ok(output) => StageRunResult::Success { output },
            Err(error) => StageRunResult::Failure { error },
        }
    }
}
