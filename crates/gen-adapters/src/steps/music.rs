//! Branch de música: corre en paralelo al fan-out de clips.
//!
//! La duración sale de la misma alineación de voz que usa el fan-out:
//! fin del último carácter + pausa final.

use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ConfigSchema, RunFile, RunStats, StageContext, StageDefinition, StageError, StageKind,
               StageOutput, StageRunResult};
use serde_json::{json, Value};

use super::{account, companion_path, text_response, MUSIC, NARRATIVE, PAUSE_AFTER_SECONDS, SPEECH};
use crate::alignment::{music_duration, DEFAULT_PAUSE_AFTER_SECONDS};
use crate::artifacts::{MusicTrack, Narrative, SpeechTrack};
use crate::generator::{Capability, MediaGenerator, TextTask};

pub const MUSIC_PROMPT_FILE: &str = "music-prompt.txt";
pub const MUSIC_FILE: &str = "music.mp3";
const MUSIC_SUFFIX: &str = ".mp3";

#[derive(Debug, Clone)]
pub struct MusicBranch {
    generator: Arc<dyn MediaGenerator>,
}

impl MusicBranch {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let narrative: Narrative = ctx.inputs.typed(NARRATIVE)?;
        let speech: SpeechTrack = ctx.inputs.typed(SPEECH)?;
        let pause = ctx.config.parse_or(PAUSE_AFTER_SECONDS, DEFAULT_PAUSE_AFTER_SECONDS)?;
        let duration_seconds = music_duration(&speech.alignment, pause)?;
        let (generator, config) = (&self.generator, &ctx.config);
        let mut stats = RunStats::default();

        let prompt_request = json!({ "narrative": narrative.text, "duration_seconds": duration_seconds });
        let prompt = ctx.cache
                        .get_or_compute(&generator.operation(Capability::Text, "music-prompt"), &prompt_request, |_w| {
                            generator.complete_text(TextTask::MusicPrompt, &prompt_request, config)
                        })
                        .await?;
        account(&mut stats, &prompt, "text_requests", 1.0);
        let prompt = text_response("music prompt", prompt.data)?;

        let music_request = json!({ "prompt": prompt, "duration_seconds": duration_seconds });
        let prompt_text = prompt.as_str();
        let music = ctx.cache
                       .get_or_compute(&generator.operation(Capability::Music, "compose"), &music_request, |w| async move {
                           let audio = generator.compose_music(prompt_text, duration_seconds, config).await?;
                           w.write_companion(MUSIC_SUFFIX, &audio).await?;
                           Ok::<Value, StageError>(json!({ "bytes": audio.len() }))
                       })
                       .await?;
        account(&mut stats, &music, "music_seconds", duration_seconds);

        StageOutput::typed(MusicTrack { audio_path: companion_path(ctx, &music.prefix, MUSIC_SUFFIX),
                                        prompt,
                                        duration_seconds,
                                        schema_version: 1 },
                           stats)
    }
}

#[async_trait]
impl StageDefinition for MusicBranch {
    fn id(&self) -> &str {
        MUSIC
    }

    fn kind(&self) -> StageKind {
        StageKind::Branch
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator
            .config_schema(Capability::Text)
            .merge(self.generator.config_schema(Capability::Music))
            .optional(PAUSE_AFTER_SECONDS)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        let mut files = Vec::new();
        if let Some(prompt) = output.payload["prompt"].as_str() {
            files.push(RunFile::text(MUSIC_PROMPT_FILE, prompt));
        }
        if let Some(path) = output.payload["audio_path"].as_str() {
            files.push(RunFile::copy(MUSIC_FILE, path));
        }
        files
    }
}
