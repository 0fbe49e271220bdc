//! Merge terminal: subtítulos + mux de voz, música y clips.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ArtifactSpec, ConfigSchema, RunFile, RunStats, StageContext, StageDefinition, StageError,
               StageKind, StageOutput, StageRunResult};
use serde_json::{json, Value};

use super::{account, companion_path, MERGE, MUSIC, SPEECH};
use crate::artifacts::{MergedVideo, MusicTrack, SegmentClip, SpeechTrack};
use crate::generator::{Capability, MediaGenerator, MuxClip, MuxRequest};
use crate::subtitles::render_ass;

pub const SUBTITLES_FILE: &str = "subtitles.ass";
pub const MERGED_FILE: &str = "merged.mp4";
const VIDEO_SUFFIX: &str = ".mp4";

#[derive(Debug, Clone)]
pub struct MergeStage {
    generator: Arc<dyn MediaGenerator>,
}

impl MergeStage {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let speech: SpeechTrack = ctx.inputs.typed(SPEECH)?;
        let music: MusicTrack = ctx.inputs.typed(MUSIC)?;
        let clips = ctx.inputs
                       .segments()
                       .iter()
                       .map(SegmentClip::from_artifact)
                       .collect::<Result<Vec<_>, _>>()?;
        if clips.is_empty() {
            return Err(StageError::InvalidInput("no segment clips to merge".into()));
        }

        let subtitles = render_ass(&speech.alignment);
        let request = MuxRequest { speech_path: PathBuf::from(&speech.audio_path),
                                   music_path: PathBuf::from(&music.audio_path),
                                   subtitles,
                                   clips: clips.iter()
                                               .map(|c| MuxClip { video_path: PathBuf::from(&c.video_path),
                                                                  start_seconds: c.segment.start_seconds,
                                                                  end_seconds: c.segment.end_seconds })
                                               .collect() };
        let (generator, config, mux) = (&self.generator, &ctx.config, &request);
        let muxed = ctx.cache
                       .get_or_compute(&generator.operation(Capability::Mux, "render"), mux, |w| async move {
                           let video = generator.mux(mux, config).await?;
                           w.write_companion(VIDEO_SUFFIX, &video).await?;
                           Ok::<Value, StageError>(json!({ "bytes": video.len() }))
                       })
                       .await?;

        let mut stats = RunStats::default();
        account(&mut stats, &muxed, "renders", 1.0);
        StageOutput::typed(MergedVideo { video_path: companion_path(ctx, &muxed.prefix, VIDEO_SUFFIX),
                                         subtitles: request.subtitles,
                                         schema_version: 1 },
                           stats)
    }
}

#[async_trait]
impl StageDefinition for MergeStage {
    fn id(&self) -> &str {
        MERGE
    }

    fn kind(&self) -> StageKind {
        StageKind::Merge
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator.config_schema(Capability::Mux)
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        let mut files = Vec::new();
        if let Some(subtitles) = output.payload["subtitles"].as_str() {
            files.push(RunFile::text(SUBTITLES_FILE, subtitles));
        }
        if let Some(path) = output.payload["video_path"].as_str() {
            files.push(RunFile::copy(MERGED_FILE, path));
        }
        files
    }
}
