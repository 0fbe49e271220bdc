//! Ensamblado de la topología de video sobre el builder del core.

use std::sync::Arc;

use gen_core::engine::PipelineBuilderInit;
use gen_core::{EventStore, PipelineEngine};

use crate::generator::MediaGenerator;
use crate::steps::{CandidatesStage, MergeStage, MusicBranch, NarrativeStage, SegmentClips, SegmentPromptsStage,
                   SpeechStage};

/// candidates → narrative → speech → segment_prompts →
/// (segment_clips ‖ music) → merge
pub fn video_pipeline<E: EventStore>(init: PipelineBuilderInit<E>,
                                     generator: Arc<dyn MediaGenerator>)
                                     -> PipelineEngine<E> {
    init.select(CandidatesStage::new(Arc::clone(&generator)))
        .then(NarrativeStage::new(Arc::clone(&generator)))
        .then(SpeechStage::new(Arc::clone(&generator)))
        .then(SegmentPromptsStage::new(Arc::clone(&generator)))
        .join(SegmentClips::new(Arc::clone(&generator)), MusicBranch::new(Arc::clone(&generator)))
        .merge(MergeStage::new(generator))
        .build()
}
