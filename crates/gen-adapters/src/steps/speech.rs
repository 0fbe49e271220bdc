//! Síntesis de voz de la narración.
//!
//! El audio se guarda como companion `.mp3` de la entrada; la entrada guarda
//! la alineación por carácter.

use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ConfigSchema, RunFile, RunStats, StageContext, StageDefinition, StageError, StageOutput,
               StageRunResult};
use serde_json::json;

use super::{account, chosen_candidate, companion_path, NARRATIVE, SPEECH};
use crate::artifacts::{CharAlignment, Narrative, SpeechTrack};
use crate::generator::{Capability, MediaGenerator};

pub const SPEECH_FILE: &str = "speech.mp3";
const AUDIO_SUFFIX: &str = ".mp3";

#[derive(Debug, Clone)]
pub struct SpeechStage {
    generator: Arc<dyn MediaGenerator>,
}

impl SpeechStage {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let narrative: Narrative = ctx.inputs.typed(NARRATIVE)?;
        let voice = chosen_candidate(ctx)?.voice;
        let request = json!({ "text": narrative.text, "voice": voice });
        let op = self.generator.operation(Capability::Speech, "tts");
        let (generator, config) = (&self.generator, &ctx.config);
        let cached = ctx.cache
                        .get_or_compute(&op, &request, |w| async move {
                            let speech = generator.synthesize_speech(&narrative.text, &voice, config).await?;
                            w.write_companion(AUDIO_SUFFIX, &speech.audio).await?;
                            Ok::<CharAlignment, StageError>(speech.alignment)
                        })
                        .await?;

        let mut stats = RunStats::default();
        account(&mut stats, &cached, "tts_characters", request["text"].as_str().map_or(0, |t| t.chars().count()) as f64);
        let track = SpeechTrack { audio_path: companion_path(ctx, &cached.prefix, AUDIO_SUFFIX),
                                  alignment: cached.data,
                                  schema_version: 1 };
        StageOutput::typed(track, stats)
    }
}

#[async_trait]
impl StageDefinition for SpeechStage {
    fn id(&self) -> &str {
        SPEECH
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator.config_schema(Capability::Speech)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        match output.payload["audio_path"].as_str() {
            Some(path) => vec![RunFile::copy(SPEECH_FILE, path)],
            None => Vec::new(),
        }
    }
}
