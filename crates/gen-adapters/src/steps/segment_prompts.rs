use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{ConfigSchema, RunStats, StageContext, StageDefinition, StageError, StageOutput, StageRunResult};
use serde_json::json;

use super::{account, decode, NARRATIVE, SEGMENT_PROMPTS};
use crate::artifacts::{Narrative, SegmentPrompt, SegmentPrompts};
use crate::generator::{Capability, MediaGenerator, TextTask};

/// Divide la narración en fragmentos con su descripción visual.
#[derive(Debug, Clone)]
pub struct SegmentPromptsStage {
    generator: Arc<dyn MediaGenerator>,
}

impl SegmentPromptsStage {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let narrative: Narrative = ctx.inputs.typed(NARRATIVE)?;
        let request = json!({ "narrative": narrative.text });
        let op = self.generator.operation(Capability::Text, "segment-prompts");
        let cached = ctx.cache
                        .get_or_compute(&op, &request, |_w| {
                            self.generator.complete_text(TextTask::SegmentPrompts, &request, &ctx.config)
                        })
                        .await?;

        let mut stats = RunStats::default();
        account(&mut stats, &cached, "text_requests", 1.0);
        let prompts: Vec<SegmentPrompt> = decode("segment prompts", cached.data)?;
        if prompts.is_empty() {
            return Err(StageError::External("generator returned no segment prompts".into()));
        }
        StageOutput::typed(SegmentPrompts { prompts,
                                            schema_version: 1 },
                           stats)
    }
}

#[async_trait]
impl StageDefinition for SegmentPromptsStage {
    fn id(&self) -> &str {
        SEGMENT_PROMPTS
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator.config_schema(Capability::Text)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }
}
