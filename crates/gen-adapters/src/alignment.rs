//! Alineación de la narración con la voz sintetizada.
//!
//! Cada `SegmentPrompt` se ubica en el texto de la narración (en orden, sin
//! retroceder) y se temporiza con la alineación por carácter de la voz. Los
//! segmentos son contiguos: cada uno termina donde empieza el siguiente y el
//! último se extiende `pause_after` segundos tras el fin de la voz.

use gen_core::StageError;
use thiserror::Error;

use crate::artifacts::{CharAlignment, SegmentPrompt, SegmentSpec};

/// Silencio agregado al final del video (y de la música).
pub const DEFAULT_PAUSE_AFTER_SECONDS: f64 = 1.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("speech alignment covers {alignment} characters but the narrative has {text}")]
    LengthMismatch { text: usize, alignment: usize },
    #[error("segment {index} ('{text}') not found in narrative")]
    SegmentNotFound { index: usize, text: String },
    #[error("speech alignment is empty")]
    Empty,
    #[error("no segment prompts to align")]
    NoSegments,
}

impl From<AlignmentError> for StageError {
    fn from(err: AlignmentError) -> Self {
        StageError::InvalidInput(err.to_string())
    }
}

/// Duración de la pista de música: fin de la voz + pausa final.
pub fn music_duration(alignment: &CharAlignment, pause_after: f64) -> Result<f64, AlignmentError> {
    alignment.last_end().map(|end| end + pause_after).ok_or(AlignmentError::Empty)
}

pub fn align_segments(narrative: &str,
                      alignment: &CharAlignment,
                      prompts: &[SegmentPrompt],
                      pause_after: f64)
                      -> Result<Vec<SegmentSpec>, AlignmentError> {
    if alignment.is_empty() {
        return Err(AlignmentError::Empty);
    }
    if prompts.is_empty() {
        return Err(AlignmentError::NoSegments);
    }
    let text: Vec<char> = narrative.chars().collect();
    if text.len() != alignment.len()
       || alignment.character_start_times_seconds.len() != alignment.len()
       || alignment.character_end_times_seconds.len() != alignment.len()
    {
        return Err(AlignmentError::LengthMismatch { text: text.len(),
                                                    alignment: alignment.len() });
    }

    let mut starts = Vec::with_capacity(prompts.len());
    let mut cursor = 0;
    for (index, p) in prompts.iter().enumerate() {
        let needle: Vec<char> = p.text.trim().chars().collect();
        let found = find_from(&text, &needle, cursor).ok_or_else(|| AlignmentError::SegmentNotFound { index,
                                                                                                   text: p.text.clone() })?;
        starts.push(found);
        cursor = found + needle.len();
    }

    let times = &alignment.character_start_times_seconds;
    let speech_end = alignment.last_end().ok_or(AlignmentError::Empty)?;
    let segments = prompts.iter()
                          .enumerate()
                          .map(|(index, p)| {
                              let start_seconds = if index == 0 { 0.0 } else { times[starts[index]] };
                              let end_seconds = match starts.get(index + 1) {
                                  Some(&next) => times[next],
                                  None => speech_end + pause_after,
                              };
                              SegmentSpec { index,
                                            text: p.text.clone(),
                                            prompt: p.prompt.clone(),
                                            start_seconds,
                                            end_seconds }
                          })
                          .collect();
    Ok(segments)
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..].windows(needle.len()).position(|w| w == needle).map(|i| i + from)
}
