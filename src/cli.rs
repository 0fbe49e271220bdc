//! CLI mínima: `genflow [<choice>] [--seed <N>]`.
//!
//! Sin `choice` el run se detiene tras listar los candidatos.

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub choice: Option<usize>,
    pub seed: Option<u64>,
}

impl CliArgs {
    /// Parsea los argumentos sin el nombre del programa.
    pub fn parse<I, S>(args: I) -> Result<Self, AppError>
        where I: IntoIterator<Item = S>,
              S: AsRef<str>
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "--seed" => {
                    let raw = args.next()
                                  .ok_or_else(|| AppError::Usage("--seed requiere un valor".into()))?;
                    let seed = raw.as_ref()
                                  .parse::<u64>()
                                  .map_err(|e| AppError::Usage(format!("--seed '{}': {e}", raw.as_ref())))?;
                    parsed.seed = Some(seed);
                }
                flag if flag.starts_with("--") => {
                    return Err(AppError::Usage(format!("opción desconocida {flag}")));
                }
                value => {
                    if parsed.choice.is_some() {
                        return Err(AppError::Usage(format!("argumento sobrante '{value}'")));
                    }
                    let choice = value.parse::<usize>()
                                      .map_err(|_| AppError::Usage(format!("choice debe ser un índice, no '{value}'")))?;
                    parsed.choice = Some(choice);
                }
            }
        }
        Ok(parsed)
    }
}
