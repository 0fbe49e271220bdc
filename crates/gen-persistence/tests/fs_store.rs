use std::sync::Arc;

use gen_core::{CacheBackend, CacheEngine, Cached, RunFile, RunOutput, StageError};
use gen_persistence::{FsCacheBackend, RunDirectory, StoreConfig};
use serde_json::{json, Value};
use tempfile::tempdir;

fn engine(backend: &FsCacheBackend) -> CacheEngine {
    CacheEngine::new(Arc::new(backend.clone()) as Arc<dyn CacheBackend>)
}

#[test]
fn missing_entry_reads_as_none() {
    let dir = tempdir().unwrap();
    let backend = FsCacheBackend::new(dir.path().join("never-created"));
    let read = tokio_test::block_on(backend.read_entry("0123456789abcdef")).unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn entries_survive_engine_instances_and_keep_the_disk_layout() {
    let dir = tempdir().unwrap();
    let backend = FsCacheBackend::new(dir.path());
    let payload = json!({"model": "tts-1", "text": "hola"});

    let first: Cached<String> = engine(&backend).get_or_compute("https://api/tts", &payload, |w| async move {
                                                    w.write_companion(".mp3", b"ID3").await?;
                                                    Ok::<_, StageError>("done".to_string())
                                                })
                                                .await
                                                .unwrap();
    assert!(!first.hit);

    let entry_path = dir.path().join(format!("{}.json", first.prefix));
    let raw = std::fs::read_to_string(&entry_path).unwrap();
    assert!(raw.contains('\n'), "entries are pretty printed");
    let v: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["api_url"], "https://api/tts");
    assert_eq!(v["api_call_body"], payload);
    assert_eq!(v["api_response"], "done");

    let companion = engine(&backend).companion_location("https://api/tts", &payload, ".mp3").unwrap();
    assert_eq!(companion, dir.path().join(format!("{}.mp3", first.prefix)));
    assert_eq!(std::fs::read(&companion).unwrap(), b"ID3");

    let second: Cached<String> = engine(&backend).get_or_compute("https://api/tts", &payload, |_w| async {
                                                     Err::<String, _>(StageError::External("must not run".into()))
                                                 })
                                                 .await
                                                 .unwrap();
    assert!(second.hit);
    assert_eq!(second.data, "done");
}

#[tokio::test]
async fn corrupt_file_is_recomputed_and_overwritten() {
    let dir = tempdir().unwrap();
    let backend = FsCacheBackend::new(dir.path());
    let payload = json!({"n": 3});
    let prefix = CacheEngine::prefix_for("op", &payload).unwrap();
    std::fs::write(dir.path().join(format!("{prefix}.json")), "{\"api_url\": tr").unwrap();

    let got: Cached<u32> = engine(&backend).get_or_compute("op", &payload, |_w| async { Ok::<_, StageError>(9) })
                                           .await
                                           .unwrap();
    assert!(!got.hit);
    let again: Cached<u32> = engine(&backend).get_or_compute("op", &payload, |_w| async { Ok::<_, StageError>(1) })
                                             .await
                                             .unwrap();
    assert!(again.hit);
    assert_eq!(again.data, 9);
}

#[tokio::test]
async fn unwritable_store_still_returns_the_fresh_result() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let backend = FsCacheBackend::new(&blocker);

    let got: Cached<String> = engine(&backend).get_or_compute("op", &json!({}), |_w| async {
                                                  Ok::<_, StageError>("fresh".to_string())
                                              })
                                              .await
                                              .unwrap();
    assert_eq!(got.data, "fresh");
    assert!(!got.hit);
}

#[tokio::test]
async fn run_directory_writes_every_kind_of_file() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::under(dir.path());
    let source = dir.path().join("clip-source.mp4");
    std::fs::write(&source, b"MP4").unwrap();

    let runs = RunDirectory::from_config(&config);
    let sink = runs.open("003 Deep sea creatures").await.unwrap();
    sink.write(&RunFile::text("monologue.txt", "Once upon a time")).await.unwrap();
    sink.write(&RunFile::json("seed.json", json!(12))).await.unwrap();
    sink.write(&RunFile::copy("merged.mp4", &source)).await.unwrap();

    let run_dir = config.runs_dir.join("003 Deep sea creatures");
    assert_eq!(sink.location(), run_dir);
    assert_eq!(std::fs::read_to_string(run_dir.join("monologue.txt")).unwrap(), "Once upon a time");
    assert_eq!(std::fs::read_to_string(run_dir.join("seed.json")).unwrap(), "12");
    assert_eq!(std::fs::read(run_dir.join("merged.mp4")).unwrap(), b"MP4");
}

#[tokio::test]
async fn labels_must_be_a_single_path_component() {
    let dir = tempdir().unwrap();
    let runs = RunDirectory::new(dir.path());
    for label in ["../escape", "a/b", ""] {
        assert!(runs.open(label).await.is_err(), "label {label:?} should be rejected");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_never_share_a_temp_file() {
    let dir = tempdir().unwrap();
    let writers: Vec<_> = (0..16).map(|i| {
                                     let backend = FsCacheBackend::new(dir.path());
                                     tokio::spawn(async move {
                                         let body = format!("{{\"writer\": {i}}}");
                                         backend.write_entry("00aa11bb22cc33dd", body.as_bytes()).await
                                     })
                                 })
                                 .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let raw = std::fs::read_to_string(dir.path().join("00aa11bb22cc33dd.json")).unwrap();
    let v: Value = serde_json::from_str(&raw).unwrap();
    assert!(v["writer"].as_u64().unwrap() < 16);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap()
                                                          .filter_map(Result::ok)
                                                          .map(|e| e.file_name().to_string_lossy().into_owned())
                                                          .filter(|n| n.ends_with(".tmp"))
                                                          .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn cached_floats_read_back_unchanged_from_disk() {
    let dir = tempdir().unwrap();
    let backend = FsCacheBackend::new(dir.path());
    let payload = json!({"text": "timings"});
    let ends: Vec<f64> = (0..500).map(|i| 0.0731 * i as f64 + 0.013).collect();

    let fresh: Cached<Vec<f64>> = engine(&backend).get_or_compute("op://tts", &payload, |_w| async {
                                                      Ok::<_, StageError>(ends.clone())
                                                  })
                                                  .await
                                                  .unwrap();
    let again: Cached<Vec<f64>> = engine(&backend).get_or_compute("op://tts", &payload, |_w| async {
                                                      Ok::<_, StageError>(Vec::new())
                                                  })
                                                  .await
                                                  .unwrap();
    assert!(again.hit);
    assert!(fresh.data.iter().zip(&again.data).all(|(a, b)| a.to_bits() == b.to_bits()));
    assert_eq!(again.data.len(), ends.len());
}
