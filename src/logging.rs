//! Subscriber de `tracing` para el binario.
//!
//! Las librerías registran con `log`; el puente `tracing-log` que instala
//! `init()` los reenvía al mismo subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "genflow=info,gen_core=info,gen_adapters=info,gen_persistence=warn";

/// Instala el subscriber global honrando `RUST_LOG`.
///
/// Llamadas repetidas (tests) no fallan: sólo la primera tiene efecto.
pub fn init_logging() {
    let _ = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env()
                                                    .unwrap_or_else(|_| DEFAULT_FILTER.into()))
                                          .with(tracing_subscriber::fmt::layer().with_target(false))
                                          .try_init();
}
