mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use gen_core::{CacheBackend, CacheEngine, ConfigError, EngineOptions, InMemoryCacheBackend, PipelineError, RunConfig,
               RunEventKind, RunOutcome, RunRequest, StageError, TaskId};
use serde_json::json;
use test_support::{Fixture, Step};

fn chosen(choice: usize) -> RunRequest {
    RunRequest { seed: 42, choice: Some(choice) }
}

fn stage_positions(kinds: &[RunEventKind], started: bool) -> Vec<String> {
    kinds.iter()
         .filter_map(|k| match k {
             RunEventKind::StageStarted { stage_id } if started => Some(stage_id.clone()),
             RunEventKind::StageFinished { stage_id, .. } if !started => Some(stage_id.clone()),
             _ => None,
         })
         .collect()
}

#[tokio::test]
async fn sequential_stages_never_overlap_across_many_runs() {
    let mut fx = Fixture::new();
    // El primer stage es el más lento: cualquier solapamiento invertiría el orden.
    fx.stages = vec![Step::new("a", &fx.probe).delay(3), Step::new("b", &fx.probe), Step::new("c", &fx.probe).delay(1)];

    for _ in 0..100 {
        fx.probe.clear();
        let engine = fx.engine(CacheEngine::in_memory());
        let outcome = engine.run(chosen(0), RunConfig::default()).await.expect("run should complete");
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected completed run");
        };

        let kinds: Vec<RunEventKind> = engine.events(report.run_id).into_iter().map(|e| e.kind).collect();
        let sequential: Vec<&str> = vec!["candidates", "a", "b", "c"];
        let started = stage_positions(&kinds, true);
        assert_eq!(&started[..4], &sequential[..]);
        assert_eq!(started.last().map(String::as_str), Some("merge"));

        // Cada stage secuencial termina antes de que arranque el siguiente.
        for pair in sequential.windows(2) {
            let finished = kinds.iter()
                                .position(|k| matches!(k, RunEventKind::StageFinished { stage_id, .. } if stage_id == pair[0]))
                                .unwrap();
            let next = kinds.iter()
                            .position(|k| matches!(k, RunEventKind::StageStarted { stage_id } if stage_id == pair[1]))
                            .unwrap();
            assert!(finished < next, "{} must finish before {} starts", pair[0], pair[1]);
        }
        assert_eq!(&fx.probe.computes()[..4], &["candidates", "a", "b", "c"]);
    }
}

#[tokio::test]
async fn fan_out_and_branch_run_concurrently() {
    let mut fx = Fixture::new();
    fx.segments = fx.segments.clone().delay(150);
    fx.branch.delay_ms = 150;
    let engine = fx.engine(CacheEngine::in_memory());

    let started = Instant::now();
    let outcome = engine.run(chosen(0), RunConfig::default()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    // En serie serían 4 × 150 ms.
    assert!(elapsed < Duration::from_millis(450), "join took {elapsed:?}");
    assert_eq!(fx.segments.peak(), 3);
}

#[tokio::test]
async fn partial_failure_settles_everything_and_rerun_only_recomputes_failed_task() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let fx = Fixture::new();
    fx.segments.fail_index(1);

    let engine = fx.engine(CacheEngine::new(backend.clone() as Arc<dyn CacheBackend>));
    let err = engine.run(chosen(1), RunConfig::default()).await.unwrap_err();
    let PipelineError::FanOut(failure) = err else {
        panic!("expected fan-out failure");
    };
    assert_eq!(failure.total, 4);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].task,
               TaskId::Segment { fan_out_id: "segments".into(),
                                 index: 1 });
    assert_eq!(failure.failures[0].error, StageError::Refused("segment 1".into()));

    let computes = fx.probe.computes();
    for expected in ["segment-0", "segment-1", "segment-2", "music"] {
        assert!(computes.iter().any(|c| c == expected), "{expected} should have been attempted");
    }
    assert!(!computes.iter().any(|c| c == "merge"), "merge must not run after a failed join");

    // Segundo run: engine nuevo, mismo store, la tarea 1 ya no falla.
    fx.segments.heal();
    fx.probe.clear();
    let engine = fx.engine(CacheEngine::new(backend as Arc<dyn CacheBackend>));
    let outcome = engine.run(chosen(1), RunConfig::default()).await.unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected completed run");
    };
    assert_eq!(fx.probe.computes(), vec!["segment-1".to_string(), "merge".to_string()]);
    assert_eq!(report.label, "001 beta");
    assert_eq!(report.stats.cache_misses, 2);
}

#[tokio::test]
async fn panicking_task_is_aborted_while_siblings_still_settle() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let fx = Fixture::new();
    fx.segments.panic_index(2);

    let engine = fx.engine(CacheEngine::new(backend.clone() as Arc<dyn CacheBackend>));
    let err = engine.run(chosen(0), RunConfig::default()).await.unwrap_err();
    let PipelineError::FanOut(failure) = err else {
        panic!("expected fan-out failure");
    };
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].task,
               TaskId::Segment { fan_out_id: "segments".into(),
                                 index: 2 });
    assert!(matches!(failure.failures[0].error, StageError::Aborted(_)));

    fx.segments.heal();
    fx.probe.clear();
    let engine = fx.engine(CacheEngine::new(backend as Arc<dyn CacheBackend>));
    let outcome = engine.run(chosen(0), RunConfig::default()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(fx.probe.computes(), vec!["segment-2".to_string(), "merge".to_string()]);
}

#[tokio::test]
async fn join_failure_reports_every_failed_task() {
    let mut fx = Fixture::new();
    fx.segments.fail_index(0);
    fx.segments.fail_index(2);
    fx.branch.fail = true;
    let engine = fx.engine(CacheEngine::in_memory());

    let err = engine.run(chosen(0), RunConfig::default()).await.unwrap_err();
    let PipelineError::FanOut(failure) = &err else {
        panic!("expected fan-out failure");
    };
    let tasks: Vec<String> = failure.failures.iter().map(|f| f.task.to_string()).collect();
    assert_eq!(tasks, vec!["segments[0]", "segments[2]", "music"]);
    assert!(err.to_string().starts_with("at least one fan-out task failed (3 of 4)"));
}

#[tokio::test]
async fn sequential_failure_aborts_the_run() {
    let mut fx = Fixture::new();
    fx.stages = vec![Step::new("a", &fx.probe), Step::new("b", &fx.probe).failing(), Step::new("c", &fx.probe)];
    let engine = fx.engine(CacheEngine::in_memory());

    let err = engine.run(chosen(0), RunConfig::default()).await.unwrap_err();
    assert_eq!(err.stage_id(), Some("b"));
    assert_eq!(fx.probe.computes(), vec!["candidates", "a", "b"]);
    assert!(fx.output.file_names("000 alpha").iter().all(|f| f != "c.json" && f != "merged.json"));
}

#[tokio::test]
async fn missing_configuration_fails_before_any_stage() {
    let mut fx = Fixture::new();
    fx.stages = vec![Step::new("a", &fx.probe), Step::new("b", &fx.probe).requiring("B_API_KEY")];
    let engine = fx.engine(CacheEngine::in_memory());

    let err = engine.run(chosen(0), RunConfig::default()).await.unwrap_err();
    assert!(matches!(err,
                     PipelineError::Config(ConfigError::MissingKey { ref stage, ref key }) if stage == "b" && key == "B_API_KEY"));
    assert!(fx.probe.computes().is_empty());

    let ok = engine.run(chosen(0), RunConfig::from_pairs([("B_API_KEY", "k")])).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn without_choice_the_run_stops_after_selection() {
    let fx = Fixture::new();
    let engine = fx.engine(CacheEngine::in_memory());

    let outcome = engine.run(RunRequest { seed: 7, choice: None }, RunConfig::default()).await.unwrap();
    let RunOutcome::AwaitingChoice { run_id, candidates, .. } = outcome else {
        panic!("expected awaiting choice");
    };
    assert_eq!(candidates, vec![json!("alpha"), json!("beta")]);
    assert_eq!(fx.probe.computes(), vec!["candidates"]);
    assert!(fx.output.labels().is_empty());
    assert_eq!(engine.event_variants(run_id), vec!["I", "S", "F", "U"]);

    let err = engine.run(RunRequest { seed: 7, choice: Some(5) }, RunConfig::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidChoice { choice: 5, available: 2 }));
}

#[tokio::test]
async fn fan_out_limit_caps_in_flight_tasks() {
    let mut fx = Fixture::new();
    fx.segments = test_support::Segments::new(6, &fx.probe).delay(20);
    fx.options = EngineOptions { fan_out_limit: Some(2) };
    let engine = fx.engine(CacheEngine::in_memory());

    engine.run(chosen(0), RunConfig::default()).await.unwrap();
    assert_eq!(fx.segments.peak(), 2);
}

#[tokio::test]
async fn completed_run_writes_files_and_reproduces_its_fingerprint() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let fx = Fixture::new();

    let first = fx.engine(CacheEngine::new(backend.clone() as Arc<dyn CacheBackend>));
    let RunOutcome::Completed(a) = first.run(chosen(1), RunConfig::default()).await.unwrap() else {
        panic!("expected completed run");
    };
    let second = fx.engine(CacheEngine::new(backend as Arc<dyn CacheBackend>));
    let RunOutcome::Completed(b) = second.run(chosen(1), RunConfig::default()).await.unwrap() else {
        panic!("expected completed run");
    };

    assert_eq!(a.run_fingerprint, b.run_fingerprint);
    assert_eq!(b.stats.cache_misses, 0);
    assert_eq!(a.merged.payload, b.merged.payload);
    assert_eq!(fx.output.file_names("001 beta"),
               vec!["a.json", "b.json", "candidate.json", "merged.json", "music.json", "seed.json", "segments.json"]);
    let seed: serde_json::Value = serde_json::from_slice(&fx.output.file("001 beta", "seed.json").unwrap()).unwrap();
    assert_eq!(seed, json!(42));

    let codes = first.event_variants(a.run_id);
    assert_eq!(codes.first(), Some(&"I"));
    assert_eq!(codes.last(), Some(&"C"));
    assert_eq!(codes.iter().filter(|c| **c == "T").count(), 3);
    assert_eq!(codes.iter().filter(|c| **c == "J").count(), 1);
}
