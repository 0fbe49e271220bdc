//! Modelos neutrales (Artifact, Fingerprint, RunStats, ...)

pub mod artifact;
pub mod fingerprint;
pub mod stats;
pub mod typed_artifact;

pub use artifact::{Artifact, ArtifactKind};
pub use fingerprint::Fingerprint;
pub use stats::RunStats;
pub use typed_artifact::{ArtifactError, ArtifactSpec};
