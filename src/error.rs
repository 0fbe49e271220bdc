use gen_core::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("uso inválido: {0}")]
    Usage(String),
    #[error("configuración inválida: {key}: {reason}")]
    Config { key: String, reason: String },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    /// Código de salida del proceso.
    ///
    /// 2 = argumentos, 3 = configuración, 4 = elección fuera de rango,
    /// 5 = fallo del pipeline.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) => 2,
            AppError::Config { .. } | AppError::Pipeline(PipelineError::Config(_)) => 3,
            AppError::Pipeline(PipelineError::InvalidChoice { .. }) => 4,
            AppError::Pipeline(_) => 5,
        }
    }
}
