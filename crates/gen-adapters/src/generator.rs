//! Contrato de los servicios generativos externos.
//!
//! Los stages no hablan con ningún servicio directamente: reciben un
//! `MediaGenerator` y envuelven cada llamada en `CacheEngine::get_or_compute`.
//! Cada capacidad declara las credenciales que necesita (`config_schema`),
//! que se validan al inicio del run.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use gen_core::{ConfigSchema, RunConfig, StageError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::artifacts::{Candidate, CharAlignment};
use crate::poll::PollStatus;

/// Capacidades externas que usa el pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Text,
    Speech,
    Image,
    Clip,
    Music,
    Mux,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Speech => "speech",
            Capability::Image => "image",
            Capability::Clip => "clip",
            Capability::Music => "music",
            Capability::Mux => "mux",
        }
    }
}

/// Tareas de generación de texto (respuesta JSON estructurada).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTask {
    /// `{"candidates": [Candidate]}`
    Candidates,
    /// string con la narración completa
    Narrative,
    /// `[{"text", "prompt"}]` cubriendo la narración en orden
    SegmentPrompts,
    /// string con la descripción de la música
    MusicPrompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub audio: Vec<u8>,
    pub alignment: CharAlignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxClip {
    pub video_path: PathBuf,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Insumos del render final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxRequest {
    pub speech_path: PathBuf,
    pub music_path: PathBuf,
    pub subtitles: String,
    pub clips: Vec<MuxClip>,
}

#[async_trait]
pub trait MediaGenerator: Send + Sync + Debug {
    /// Nombre estable del proveedor; forma parte de los identificadores de
    /// operación de la cache.
    fn name(&self) -> &str;

    /// Credenciales/opciones que requiere una capacidad.
    fn config_schema(&self, _capability: Capability) -> ConfigSchema {
        ConfigSchema::empty()
    }

    /// Identificador de operación para la cache. Dos proveedores nunca
    /// comparten identificador.
    fn operation(&self, capability: Capability, detail: &str) -> String {
        format!("{}://{}/{}", self.name(), capability.as_str(), detail)
    }

    async fn complete_text(&self, task: TextTask, request: &Value, config: &RunConfig) -> Result<Value, StageError>;

    async fn synthesize_speech(&self, text: &str, voice: &str, config: &RunConfig) -> Result<SpeechAudio, StageError>;

    async fn render_image(&self, prompt: &str, config: &RunConfig) -> Result<Vec<u8>, StageError>;

    /// Encola un clip a partir de la imagen en `image_path`; devuelve el id
    /// del trabajo.
    async fn submit_clip(&self, image_path: &Path, prompt: &str, config: &RunConfig) -> Result<String, StageError>;

    async fn clip_status(&self, job_id: &str, config: &RunConfig) -> Result<PollStatus<Vec<u8>>, StageError>;

    async fn compose_music(&self, prompt: &str, duration_seconds: f64, config: &RunConfig)
                           -> Result<Vec<u8>, StageError>;

    async fn mux(&self, request: &MuxRequest, config: &RunConfig) -> Result<Vec<u8>, StageError>;
}

/// Generador offline y determinista.
///
/// Produce contenido derivado de sus inputs, registra cada llamada y permite
/// simular rechazos, demoras y credenciales requeridas. Se usa en tests y para
/// ejecutar el pipeline sin servicios reales (`GENFLOW_GENERATOR=scripted`).
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    candidates: Vec<Candidate>,
    seconds_per_char: f64,
    pending_polls: u32,
    required: Vec<(Capability, &'static str)>,
    refuse: Arc<Mutex<HashSet<String>>>,
    jobs: Arc<Mutex<HashMap<String, (String, u32)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new(vec![Candidate { topic: "octopus camouflage".into(),
                                   title: "How Octopuses Vanish".into(),
                                   voice: "narrator".into() },
                       Candidate { topic: "desert rain".into(),
                                   title: "When the Desert Blooms".into(),
                                   voice: "narrator".into() },
                       Candidate { topic: "tardigrades".into(),
                                   title: "Tiny/Unkillable".into(),
                                   voice: "kyana".into() }])
    }
}

impl ScriptedGenerator {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates,
               seconds_per_char: 0.05,
               pending_polls: 1,
               required: Vec::new(),
               refuse: Arc::default(),
               jobs: Arc::default(),
               calls: Arc::default() }
    }

    /// Consultas `Pending` antes de que un clip esté listo.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Declara una credencial requerida para `capability`.
    pub fn requiring(mut self, capability: Capability, key: &'static str) -> Self {
        self.required.push((capability, key));
        self
    }

    /// Rechaza clips cuyo prompt contenga `needle`.
    pub fn refuse_containing(&self, needle: &str) {
        self.refuse.lock().unwrap_or_else(PoisonError::into_inner).insert(needle.to_string());
    }

    pub fn allow_all(&self) {
        self.refuse.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Llamadas reales recibidas, en orden (`"text:narrative"`, `"clip"`, ...).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call.into());
    }

    fn narrative_for(request: &Value) -> String {
        let title = request["title"].as_str().unwrap_or("Untitled");
        let topic = request["topic"].as_str().unwrap_or("something");
        format!("{title}. Today we look at {topic}. It is stranger than it seems. Stay until the end.")
    }

    fn segment_prompts_for(narrative: &str) -> Value {
        let prompts: Vec<Value> = narrative.split_inclusive(". ")
                                           .map(str::trim)
                                           .filter(|s| !s.is_empty())
                                           .map(|s| json!({ "text": s, "prompt": format!("cinematic shot: {s}") }))
                                           .collect();
        Value::Array(prompts)
    }
}

#[async_trait]
impl MediaGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn config_schema(&self, capability: Capability) -> ConfigSchema {
        self.required
            .iter()
            .filter(|(c, _)| *c == capability)
            .fold(ConfigSchema::empty(), |schema, (_, key)| schema.require(*key))
    }

    async fn complete_text(&self, task: TextTask, request: &Value, _config: &RunConfig) -> Result<Value, StageError> {
        let task_name = serde_json::to_value(task).ok()
                                                  .and_then(|v| v.as_str().map(str::to_string))
                                                  .unwrap_or_default();
        self.record(format!("text:{task_name}"));
        match task {
            TextTask::Candidates => {
                let max = request["max_candidates"].as_u64().unwrap_or(u64::MAX) as usize;
                let list: Vec<&Candidate> = self.candidates.iter().take(max).collect();
                Ok(json!({ "candidates": list }))
            }
            TextTask::Narrative => Ok(Value::String(Self::narrative_for(request))),
            TextTask::SegmentPrompts => {
                let narrative = request["narrative"].as_str()
                                                    .ok_or_else(|| StageError::InvalidInput("narrative missing".into()))?;
                Ok(Self::segment_prompts_for(narrative))
            }
            TextTask::MusicPrompt => {
                let duration = request["duration_seconds"].as_f64().unwrap_or_default();
                Ok(Value::String(format!("slow ambient synth pads, {duration:.1} seconds")))
            }
        }
    }

    async fn synthesize_speech(&self, text: &str, voice: &str, _config: &RunConfig) -> Result<SpeechAudio, StageError> {
        self.record("speech");
        let step = self.seconds_per_char;
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let n = chars.len();
        Ok(SpeechAudio { audio: format!("AUDIO[{voice}]:{text}").into_bytes(),
                         alignment: CharAlignment { characters: chars,
                                                    character_start_times_seconds: (0..n).map(|i| i as f64 * step)
                                                                                         .collect(),
                                                    character_end_times_seconds: (0..n).map(|i| (i + 1) as f64 * step)
                                                                                       .collect() } })
    }

    async fn render_image(&self, prompt: &str, _config: &RunConfig) -> Result<Vec<u8>, StageError> {
        self.record("image");
        Ok(format!("PNG:{prompt}").into_bytes())
    }

    async fn submit_clip(&self, _image_path: &Path, prompt: &str, _config: &RunConfig) -> Result<String, StageError> {
        self.record("clip");
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let job_id = format!("job-{}", jobs.len());
        jobs.insert(job_id.clone(), (prompt.to_string(), 0));
        Ok(job_id)
    }

    async fn clip_status(&self, job_id: &str, _config: &RunConfig) -> Result<PollStatus<Vec<u8>>, StageError> {
        let (prompt, polls) = {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            let job = jobs.get_mut(job_id)
                          .ok_or_else(|| StageError::External(format!("unknown job {job_id}")))?;
            job.1 += 1;
            job.clone()
        };
        if polls <= self.pending_polls {
            return Ok(PollStatus::Pending);
        }
        let refused = self.refuse
                          .lock()
                          .unwrap_or_else(PoisonError::into_inner)
                          .iter()
                          .any(|needle| prompt.contains(needle.as_str()));
        if refused {
            return Err(StageError::Refused(format!("clip for '{prompt}'")));
        }
        Ok(PollStatus::Ready(format!("MP4:{prompt}").into_bytes()))
    }

    async fn compose_music(&self, prompt: &str, duration_seconds: f64, _config: &RunConfig)
                           -> Result<Vec<u8>, StageError> {
        self.record("music");
        Ok(format!("MUSIC[{duration_seconds:.2}]:{prompt}").into_bytes())
    }

    async fn mux(&self, request: &MuxRequest, _config: &RunConfig) -> Result<Vec<u8>, StageError> {
        self.record("mux");
        let manifest = serde_json::to_vec_pretty(request).map_err(|e| StageError::External(e.to_string()))?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn segment_prompts_cover_the_narrative_in_order() {
        let g = ScriptedGenerator::default();
        let cfg = RunConfig::default();
        let narrative = g.complete_text(TextTask::Narrative, &json!({"title": "T", "topic": "x"}), &cfg)
                         .await
                         .unwrap();
        let prompts = g.complete_text(TextTask::SegmentPrompts, &json!({ "narrative": narrative }), &cfg)
                       .await
                       .unwrap();
        let texts: Vec<&str> = prompts.as_array().unwrap().iter().map(|p| p["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["T.", "Today we look at x.", "It is stranger than it seems.", "Stay until the end."]);
        assert_eq!(g.calls(), vec!["text:narrative", "text:segment_prompts"]);
    }

    #[tokio::test]
    async fn clips_become_ready_after_pending_polls_unless_refused() {
        let g = ScriptedGenerator::default().with_pending_polls(2);
        let cfg = RunConfig::default();
        let job = g.submit_clip(Path::new("img.png"), "a calm lake", &cfg).await.unwrap();
        assert_eq!(g.clip_status(&job, &cfg).await.unwrap(), PollStatus::Pending);
        assert_eq!(g.clip_status(&job, &cfg).await.unwrap(), PollStatus::Pending);
        assert!(matches!(g.clip_status(&job, &cfg).await.unwrap(), PollStatus::Ready(_)));

        g.refuse_containing("lake");
        let job = g.submit_clip(Path::new("img.png"), "a calm lake", &cfg).await.unwrap();
        for _ in 0..2 {
            g.clip_status(&job, &cfg).await.unwrap();
        }
        assert!(matches!(g.clip_status(&job, &cfg).await, Err(StageError::Refused(_))));
    }

    #[test]
    fn required_keys_are_reported_per_capability() {
        let g = ScriptedGenerator::default().requiring(Capability::Clip, "FAL_KEY");
        assert_eq!(g.config_schema(Capability::Clip).required, vec!["FAL_KEY"]);
        assert!(g.config_schema(Capability::Speech).required.is_empty());
        assert_eq!(g.operation(Capability::Clip, "stable-video"), "scripted://clip/stable-video");
    }
}
