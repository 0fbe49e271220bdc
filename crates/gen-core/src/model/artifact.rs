//! Artifact neutral del pipeline.
//!
//! Un `Artifact` es el Stage Result que fluye entre stages. Es neutral:
//! - `payload` es JSON genérico; el orquestador no interpreta su semántica.
//! - `hash` lo asigna el orquestador sobre el JSON canonicalizado y sirve para
//!   el fingerprint agregado del run.
//! - `metadata` permite anotar información auxiliar que no entra al hash.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tipos neutrales de artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// JSON genérico sin semántica.
    GenericJson,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub hash: String,            // hash canonical del payload (asignado por el orquestador)
    pub payload: Value,          // contenido neutro JSON
    pub metadata: Option<Value>, // información auxiliar (no entra al hash)
}

impl Artifact {
    /// Artifact `GenericJson` sin hash.
    pub fn json(payload: Value) -> Self {
        Self { kind: ArtifactKind::GenericJson,
               hash: String::new(),
               payload,
               metadata: None }
    }

    pub(crate) fn new_unhashed(kind: ArtifactKind, payload: Value, metadata: Option<Value>) -> Self {
        Self { kind,
               hash: String::new(),
               payload,
               metadata }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
