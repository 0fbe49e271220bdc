//! Stage de selección: propone candidatos de tema para el video.

use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ArtifactSpec, ConfigSchema, RunStats, SelectionDefinition, StageContext, StageDefinition,
               StageError, StageKind, StageOutput, StageRunResult};
use serde_json::{json, Value};

use super::{account, decode, CANDIDATES, DEFAULT_MAX_CANDIDATES, MAX_CANDIDATES};
use crate::artifacts::{Candidate, CandidateList};
use crate::generator::{Capability, MediaGenerator, TextTask};

#[derive(Debug, Clone)]
pub struct CandidatesStage {
    generator: Arc<dyn MediaGenerator>,
}

impl CandidatesStage {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let max = ctx.config.parse_or(MAX_CANDIDATES, DEFAULT_MAX_CANDIDATES)?;
        let request = json!({ "seed": ctx.run.seed, "max_candidates": max });
        let op = self.generator.operation(Capability::Text, "candidates");
        let cached = ctx.cache
                        .get_or_compute(&op, &request, |_w| {
                            self.generator.complete_text(TextTask::Candidates, &request, &ctx.config)
                        })
                        .await?;

        let mut stats = RunStats::default();
        account(&mut stats, &cached, "text_requests", 1.0);
        let candidates: Vec<Candidate> = decode("candidates", cached.data["candidates"].clone())?;
        StageOutput::typed(CandidateList { candidates,
                                           schema_version: 1 },
                           stats)
    }
}

#[async_trait]
impl StageDefinition for CandidatesStage {
    fn id(&self) -> &str {
        CANDIDATES
    }

    fn kind(&self) -> StageKind {
        StageKind::Selection
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator.config_schema(Capability::Text).optional(MAX_CANDIDATES)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }
}

impl SelectionDefinition for CandidatesStage {
    fn candidates(&self, output: &Artifact) -> Result<Vec<Value>, StageError> {
        CandidateList::from_artifact(output)?.candidates
                                             .iter()
                                             .map(|c| serde_json::to_value(c).map_err(|e| StageError::Artifact(e.to_string())))
                                             .collect()
    }

    fn label(&self, candidate: &Value) -> String {
        serde_json::from_value::<Candidate>(candidate.clone()).map(|c| c.dir_label())
                                                              .unwrap_or_else(|_| "untitled".to_string())
    }
}
