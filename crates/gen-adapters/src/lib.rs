//! gen-adapters: stages del pipeline de video sobre `gen-core`.
//!
//! Este crate provee:
//! - Artifacts tipados (`artifacts`) que viajan como payload JSON neutro.
//! - Alineación texto/voz → segmentos temporizados (`alignment`).
//! - Espera acotada de trabajos externos (`poll`).
//! - El contrato de servicios generativos `MediaGenerator` y una
//!   implementación offline determinista (`ScriptedGenerator`).
//! - Los stages concretos y el ensamblado de la topología (`steps`,
//!   `pipeline`).
//!
//! El core sólo conoce `Artifact`; toda la semántica de video vive aquí.

pub mod alignment;
pub mod artifacts;
pub mod generator;
pub mod pipeline;
pub mod poll;
pub mod steps;
pub mod subtitles;

pub use generator::{Capability, MediaGenerator, MuxClip, MuxRequest, ScriptedGenerator, SpeechAudio, TextTask};
pub use pipeline::video_pipeline;
pub use poll::{poll_until, PollPolicy, PollStatus};
