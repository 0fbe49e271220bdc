//! Stage Results tipados del pipeline de video.
//!
//! Cada tipo define la forma del `payload` JSON que el engine hashea y pasa
//! al stage siguiente. Las rutas apuntan a companions de la cache: son
//! derivables de los inputs, por eso pueden formar parte del payload.

use gen_core::typed_artifact;
use serde::{Deserialize, Serialize};

/// Candidato propuesto por el stage de selección.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub topic: String,
    pub title: String,
    pub voice: String,
}

impl Candidate {
    /// Título apto para nombre de directorio (sin separadores de ruta).
    pub fn dir_label(&self) -> String {
        self.title.replace(['/', '\\'], "").trim().to_string()
    }
}

typed_artifact!(CandidateList { candidates: Vec<Candidate> });

typed_artifact!(Narrative { text: String });

/// Alineación por carácter devuelta por el servicio de voz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharAlignment {
    pub characters: Vec<String>,
    pub character_start_times_seconds: Vec<f64>,
    pub character_end_times_seconds: Vec<f64>,
}

impl CharAlignment {
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Fin del último carácter hablado.
    pub fn last_end(&self) -> Option<f64> {
        self.character_end_times_seconds.last().copied()
    }
}

typed_artifact!(SpeechTrack {
    audio_path: String,
    alignment: CharAlignment,
});

/// Fragmento de la narración con la descripción visual que lo acompaña.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPrompt {
    pub text: String,
    pub prompt: String,
}

typed_artifact!(SegmentPrompts { prompts: Vec<SegmentPrompt> });

/// Input de una Segment Task: fragmento ubicado en la línea de tiempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub index: usize,
    pub text: String,
    pub prompt: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl SegmentSpec {
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

typed_artifact!(SegmentClip {
    segment: SegmentSpec,
    image_path: String,
    video_path: String,
});

typed_artifact!(MusicTrack {
    prompt: String,
    duration_seconds: f64,
    audio_path: String,
});

typed_artifact!(MergedVideo {
    video_path: String,
    subtitles: String,
});
