//! Fan-out de clips: una Segment Task por fragmento alineado.
//!
//! Cada tarea renderiza una imagen (companion `.png`) y la anima como clip
//! (companion `-vid.mp4`). El trabajo de video es asíncrono en el proveedor
//! y se espera con una `PollPolicy` acotada. Un rechazo del proveedor llega
//! como `StageError::Refused`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gen_core::{Artifact, ConfigSchema, FanOutDefinition, RunConfig, RunFile, RunStats, StageError, StageInputs,
               StageOutput, StageRunResult, TaskContext};
use log::debug;
use serde_json::{json, Value};

use super::{account, companion_path, NARRATIVE, PAUSE_AFTER_SECONDS, SEGMENT_CLIPS, SEGMENT_PROMPTS, SPEECH};
use crate::alignment::{align_segments, DEFAULT_PAUSE_AFTER_SECONDS};
use crate::artifacts::{Narrative, SegmentClip, SegmentPrompts, SegmentSpec, SpeechTrack};
use crate::generator::{Capability, MediaGenerator};
use crate::poll::{poll_until, PollPolicy};

pub const ALIGNMENTS_FILE: &str = "alignments.json";
pub const IMAGE_SUFFIX: &str = ".png";
pub const CLIP_SUFFIX: &str = "-vid.mp4";

#[derive(Debug, Clone)]
pub struct SegmentClips {
    generator: Arc<dyn MediaGenerator>,
}

impl SegmentClips {
    pub fn new(generator: Arc<dyn MediaGenerator>) -> Self {
        Self { generator }
    }

    async fn produce(&self, ctx: &TaskContext) -> Result<StageOutput, StageError> {
        let spec: SegmentSpec = serde_json::from_value(ctx.input.clone()).map_err(|e| {
                                                                             StageError::InvalidInput(format!("segment {}: {e}", ctx.index))
                                                                         })?;
        let stage = &ctx.stage;
        let (generator, config) = (&self.generator, &stage.config);
        let policy = PollPolicy::from_config(config)?;
        let mut stats = RunStats::default();

        let (prompt, index) = (spec.prompt.as_str(), spec.index);

        let image_request = json!({ "prompt": prompt });
        let image = stage.cache
                         .get_or_compute(&generator.operation(Capability::Image, "text-to-image"),
                                         &image_request,
                                         |w| async move {
                                             let bytes = generator.render_image(prompt, config).await?;
                                             w.write_companion(IMAGE_SUFFIX, &bytes).await?;
                                             Ok::<Value, StageError>(json!({ "bytes": bytes.len() }))
                                         })
                         .await?;
        account(&mut stats, &image, "images", 1.0);
        let image_path = companion_path(stage, &image.prefix, IMAGE_SUFFIX);
        let image_file = Path::new(&image_path);

        // Sin credenciales en el payload: la entrada depende sólo del contenido.
        let clip_request = json!({ "prompt": prompt, "image_path": image_path });
        let clip = stage.cache
                        .get_or_compute(&generator.operation(Capability::Clip, "image-to-video"),
                                        &clip_request,
                                        |w| async move {
                                            let job = generator.submit_clip(image_file, prompt, config).await?;
                                            debug!("segment {index} submitted as {job}");
                                            let job = job.as_str();
                                            let video = poll_until(policy, |_| generator.clip_status(job, config)).await?;
                                            w.write_companion(CLIP_SUFFIX, &video).await?;
                                            Ok::<Value, StageError>(json!({ "bytes": video.len() }))
                                        })
                        .await?;
        account(&mut stats, &clip, "clip_seconds", spec.duration());

        let out = SegmentClip { video_path: companion_path(stage, &clip.prefix, CLIP_SUFFIX),
                                image_path,
                                segment: spec,
                                schema_version: 1 };
        StageOutput::typed(out, stats)
    }
}

#[async_trait]
impl FanOutDefinition for SegmentClips {
    fn id(&self) -> &str {
        SEGMENT_CLIPS
    }

    fn config_schema(&self) -> ConfigSchema {
        self.generator
            .config_schema(Capability::Image)
            .merge(self.generator.config_schema(Capability::Clip))
            .merge(PollPolicy::config_schema())
            .optional(PAUSE_AFTER_SECONDS)
    }

    fn plan(&self, inputs: &StageInputs, config: &RunConfig) -> Result<Vec<Value>, StageError> {
        let narrative: Narrative = inputs.typed(NARRATIVE)?;
        let speech: SpeechTrack = inputs.typed(SPEECH)?;
        let prompts: SegmentPrompts = inputs.typed(SEGMENT_PROMPTS)?;
        let pause = config.parse_or(PAUSE_AFTER_SECONDS, DEFAULT_PAUSE_AFTER_SECONDS)?;
        align_segments(&narrative.text, &speech.alignment, &prompts.prompts, pause)?
            .iter()
            .map(|s| serde_json::to_value(s).map_err(|e| StageError::Artifact(e.to_string())))
            .collect()
    }

    async fn run_task(&self, ctx: TaskContext) -> StageRunResult {
        self.produce(&ctx).await.into()
    }

    fn exports(&self, outputs: &[Artifact]) -> Vec<RunFile> {
        let clips: Vec<Value> = outputs.iter().map(|a| a.payload.clone()).collect();
        vec![RunFile::json(ALIGNMENTS_FILE, Value::Array(clips))]
    }
}
