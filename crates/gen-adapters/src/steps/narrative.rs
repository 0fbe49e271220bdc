//! Narración hablada del video a partir del candidato elegido.

use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ConfigSchema, RunFile, RunStats, StageContext, StageDefinition, StageError, StageOutput,
               StageRunResult};
use serde_json::json;

use super::{account, chosen_candidate, text_response, NARRATIVE};
use crate::artifacts::Narrative;
use crate::generator::{Capability, MediaGenerator, TextTask};

pub const MONOLOGUE_FILE: &str = "monologue.txt";

#[derive(Debug, Clone)]
pub struct NarrativeStage {
    generator: Arc<dyn MediaGenerator>,
}

impl NarrativeStage {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let candidate = chosen_candidate(ctx)?;
        let request = json!({ "topic": candidate.topic, "title": candidate.title, "voice": candidate.voice });
        let op = self.generator.operation(Capability::Text, "narrative");
        let cached = ctx.cache
                        .get_or_compute(&op, &request, |_w| {
                            self.generator.complete_text(TextTask::Narrative, &request, &ctx.config)
                        })
                        .await?;

        let mut stats = RunStats::default();
        account(&mut stats, &cached, "text_requests", 1.0);
        let text = text_response("narrative", cached.data)?;
        StageOutput::typed(Narrative { text, schema_version: 1 }, stats)
    }
}

#[async_trait]
impl StageDefinition for NarrativeStage {
    fn id(&self) -> &str {
        NARRATIVE
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator.config_schema(Capability::Text)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        match output.payload["text"].as_str() {
            Some(text) => vec![RunFile::text(MONOLOGUE_FILE, text)],
            None => Vec::new(),
        }
    }
}
