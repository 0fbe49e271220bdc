#![allow(dead_code)]
//! Stages de prueba compartidos por los tests de integración del engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gen_core::{Artifact, CacheEngine, Cached, ConfigSchema, EngineOptions, FanOutDefinition, InMemoryRunOutput,
               PipelineEngine, RunConfig, RunFile, RunStats, SelectionDefinition, StageContext, StageDefinition,
               StageError, StageInputs, StageKind, StageOutput, StageRunResult, TaskContext};
use serde_json::{json, Value};

/// Registro de invocaciones reales de `compute` (los hits no aparecen).
#[derive(Debug, Clone, Default)]
pub struct Probe {
    computes: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn record(&self, what: impl Into<String>) {
        self.computes.lock().unwrap().push(what.into());
    }

    pub fn computes(&self) -> Vec<String> {
        self.computes.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.computes.lock().unwrap().clear();
    }
}

fn to_result(res: Result<Cached<Value>, StageError>) -> StageRunResult {
    res.map(|cached| {
           let mut stats = RunStats::default();
           stats.record_cache(cached.hit);
           StageOutput::new(Artifact::json(cached.data), stats)
       })
       .into()
}

#[derive(Debug, Clone)]
pub struct Pick {
    pub probe: Probe,
    pub candidates: Vec<&'static str>,
}

#[async_trait]
impl StageDefinition for Pick {
    fn id(&self) -> &str {
        "candidates"
    }

    fn kind(&self) -> StageKind {
        StageKind::Selection
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        let probe = self.probe.clone();
        let candidates = self.candidates.clone();
        let res = ctx.cache
                     .get_or_compute("test://candidates", &json!({ "seed": ctx.run.seed }), |_w| async move {
                         probe.record("candidates");
                         Ok::<_, StageError>(json!({ "candidates": candidates }))
                     })
                     .await;
        to_result(res)
    }
}

impl SelectionDefinition for Pick {
    fn candidates(&self, output: &Artifact) -> Result<Vec<Value>, StageError> {
        output.payload["candidates"].as_array()
                                    .cloned()
                                    .ok_or_else(|| StageError::InvalidInput("candidates missing".into()))
    }

    fn label(&self, candidate: &Value) -> String {
        candidate.as_str().unwrap_or("untitled").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub id: &'static str,
    pub delay_ms: u64,
    pub fail: bool,
    pub requires: Option<&'static str>,
    pub probe: Probe,
}

impl Step {
    pub fn new(id: &'static str, probe: &Probe) -> Self {
        Self { id,
               delay_ms: 0,
               fail: false,
               requires: None,
               probe: probe.clone() }
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn requiring(mut self, key: &'static str) -> Self {
        self.requires = Some(key);
        self
    }
}

#[async_trait]
impl StageDefinition for Step {
    fn id(&self) -> &str {
        self.id
    }

    fn config_schema(&self) -> ConfigSchema {
        match self.requires {
            Some(key) => ConfigSchema::empty().require(key),
            None => ConfigSchema::empty(),
        }
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        let prev = ctx.inputs.previous().map(|(_, a)| a.payload.clone()).unwrap_or(Value::Null);
        let (id, delay, fail, probe) = (self.id, self.delay_ms, self.fail, self.probe.clone());
        let body = json!({ "input": prev.clone() });
        let res = ctx.cache
                     .get_or_compute(&format!("test://{id}"), &body, |_w| async move {
                         probe.record(id);
                         tokio::time::sleep(Duration::from_millis(delay)).await;
                         if fail {
                             return Err(StageError::External(format!("{id} exploded")));
                         }
                         Ok(json!({ "stage": id, "from": prev }))
                     })
                     .await;
        to_result(res)
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        vec![RunFile::json(&format!("{}.json", self.id), output.payload.clone())]
    }
}

#[derive(Debug, Clone)]
pub struct Segments {
    pub count: usize,
    pub delay_ms: u64,
    pub probe: Probe,
    pub failing: Arc<Mutex<HashSet<usize>>>,
    pub panicking: Arc<Mutex<HashSet<usize>>>,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl Segments {
    pub fn new(count: usize, probe: &Probe) -> Self {
        Self { count,
               delay_ms: 0,
               probe: probe.clone(),
               failing: Arc::default(),
               panicking: Arc::default(),
               active: Arc::default(),
               peak: Arc::default() }
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn fail_index(&self, index: usize) {
        self.failing.lock().unwrap().insert(index);
    }

    /// La tarea `index` entra en pánico dentro de su compute.
    pub fn panic_index(&self, index: usize) {
        self.panicking.lock().unwrap().insert(index);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.panicking.lock().unwrap().clear();
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FanOutDefinition for Segments {
    fn id(&self) -> &str {
        "segments"
    }

    fn plan(&self, inputs: &StageInputs, _config: &RunConfig) -> Result<Vec<Value>, StageError> {
        let topic = inputs.selected_candidate().cloned().unwrap_or(Value::Null);
        Ok((0..self.count).map(|index| json!({ "index": index, "topic": topic })).collect())
    }

    async fn run_task(&self, ctx: TaskContext) -> StageRunResult {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let index = ctx.index;
        let fail = self.failing.lock().unwrap().contains(&index);
        let explode = self.panicking.lock().unwrap().contains(&index);
        let probe = self.probe.clone();
        let res = ctx.stage
                     .cache
                     .get_or_compute("test://segment", &ctx.input, |_w| async move {
                         probe.record(format!("segment-{index}"));
                         if explode {
                             panic!("segment {index} exploded");
                         }
                         if fail {
                             return Err(StageError::Refused(format!("segment {index}")));
                         }
                         Ok(json!({ "clip": index }))
                     })
                     .await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        to_result(res)
    }

    fn exports(&self, outputs: &[Artifact]) -> Vec<RunFile> {
        let clips: Vec<Value> = outputs.iter().map(|a| a.payload.clone()).collect();
        vec![RunFile::json("segments.json", json!(clips))]
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub delay_ms: u64,
    pub fail: bool,
    pub probe: Probe,
}

#[async_trait]
impl StageDefinition for Branch {
    fn id(&self) -> &str {
        "music"
    }

    fn kind(&self) -> StageKind {
        StageKind::Branch
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        let (delay, fail, probe) = (self.delay_ms, self.fail, self.probe.clone());
        let topic = ctx.inputs.selected_candidate().cloned().unwrap_or(Value::Null);
        let res = ctx.cache
                     .get_or_compute("test://music", &json!({ "topic": topic }), |_w| async move {
                         probe.record("music");
                         tokio::time::sleep(Duration::from_millis(delay)).await;
                         if fail {
                             return Err(StageError::External("music service down".into()));
                         }
                         Ok(json!({ "track": "ok" }))
                     })
                     .await;
        to_result(res)
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        vec![RunFile::json("music.json", output.payload.clone())]
    }
}

#[derive(Debug, Clone)]
pub struct Merge {
    pub probe: Probe,
}

#[async_trait]
impl StageDefinition for Merge {
    fn id(&self) -> &str {
        "merge"
    }

    fn kind(&self) -> StageKind {
        StageKind::Merge
    }

    async fn run(&self, ctx: StageContext) -> StageRunResult {
        let segments: Vec<Value> = ctx.inputs.segments().iter().map(|a| a.payload.clone()).collect();
        let music = ctx.inputs.get("music").map(|a| a.payload.clone()).unwrap_or(Value::Null);
        let probe = self.probe.clone();
        let body = json!({ "segments": segments, "music": music });
        let merged = body.clone();
        let res = ctx.cache
                     .get_or_compute("test://merge", &body, |_w| async move {
                         probe.record("merge");
                         Ok::<_, StageError>(merged)
                     })
                     .await;
        to_result(res)
    }

    fn exports(&self, output: &Artifact) -> Vec<RunFile> {
        vec![RunFile::json("merged.json", output.payload.clone())]
    }
}

/// Pieces of a test pipeline, kept so tests can inspect them after a run.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub probe: Probe,
    pub segments: Segments,
    pub branch: Branch,
    pub stages: Vec<Step>,
    pub output: Arc<InMemoryRunOutput>,
    pub options: EngineOptions,
}

impl Fixture {
    pub fn new() -> Self {
        let probe = Probe::default();
        Self { segments: Segments::new(3, &probe),
               branch: Branch { delay_ms: 0,
                                fail: false,
                                probe: probe.clone() },
               stages: vec![Step::new("a", &probe), Step::new("b", &probe)],
               output: Arc::new(InMemoryRunOutput::new()),
               options: EngineOptions::default(),
               probe }
    }

    pub fn engine(&self, cache: CacheEngine) -> PipelineEngine {
        let mut builder = PipelineEngine::builder(cache).with_output(self.output.clone())
                                                        .with_options(self.options.clone())
                                                        .select(Pick { probe: self.probe.clone(),
                                                                       candidates: vec!["alpha", "beta"] });
        for stage in &self.stages {
            builder = builder.then(stage.clone());
        }
        builder.join(self.segments.clone(), self.branch.clone())
               .merge(Merge { probe: self.probe.clone() })
               .build()
    }
}
