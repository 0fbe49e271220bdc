//! Ejecución settle-all de las Segment Tasks.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use log::warn;
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::errors::StageError;
use crate::event::{EventStore, RunEventKind};
use crate::step::{FanOutDefinition, StageContext, StageOutput, StageRunResult, TaskContext, TaskTable};

/// Lanza una tarea por input y espera a que todas sean terminales.
///
/// - Sin cancelación: una falla no detiene a las hermanas.
/// - `limit` acota cuántas tareas ejecutan a la vez; `None` las lanza todas.
/// - Una tarea pasa a `Running` en `table` recién al ser admitida; las que
///   esperan un permiso siguen `Pending`.
/// - El resultado conserva el orden de `inputs`.
pub(crate) async fn settle_all<E>(fan_out: Arc<dyn FanOutDefinition>,
                                  ctx: StageContext,
                                  inputs: Vec<Value>,
                                  limit: Option<usize>,
                                  table: Arc<Mutex<TaskTable>>,
                                  events: Arc<E>,
                                  run_id: Uuid)
                                  -> Vec<Result<StageOutput, StageError>>
    where E: EventStore + 'static
{
    let admission = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let handles: Vec<_> = inputs.into_iter()
                                .enumerate()
                                .map(|(index, input)| {
                                    let fan_out = Arc::clone(&fan_out);
                                    let events = Arc::clone(&events);
                                    let admission = admission.clone();
                                    let table = Arc::clone(&table);
                                    let task = TaskContext { stage: ctx.clone(),
                                                             index,
                                                             input };
                                    tokio::spawn(async move {
                                        let permit = match admission {
                                            Some(sem) => sem.acquire_owned().await.map(Some),
                                            None => Ok(None),
                                        };
                                        mark_running(&table, index);
                                        let _permit = match permit {
                                            Ok(p) => p,
                                            Err(e) => {
                                                return StageRunResult::Failure { error: StageError::Aborted(e.to_string()) }
                                            }
                                        };
                                        let fan_out_id = fan_out.id().to_string();
                                        events.append_kind(run_id, RunEventKind::TaskStarted { fan_out_id: fan_out_id.clone(), index });
                                        let res = fan_out.run_task(task).await;
                                        events.append_kind(run_id,
                                                           RunEventKind::TaskSettled { fan_out_id,
                                                                                       index,
                                                                                       succeeded: res.is_success() });
                                        res
                                    })
                                })
                                .collect();

    join_all(handles).await
                     .into_iter()
                     .enumerate()
                     .map(|(index, joined)| match joined {
                         Ok(res) => res.into_result(),
                         Err(e) => {
                             warn!("fan-out task {index} did not finish normally: {e}");
                             Err(StageError::Aborted(e.to_string()))
                         }
                     })
                     .collect()
}

fn mark_running(table: &Mutex<TaskTable>, index: usize) {
    if let Err(e) = table.lock().unwrap_or_else(PoisonError::into_inner).start(index) {
        warn!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::cache::CacheEngine;
    use crate::config::RunConfig;
    use crate::event::InMemoryEventStore;
    use crate::model::{Artifact, RunStats};
    use crate::step::{RunParams, StageInputs, TaskStatus};

    /// La tarea 0 espera a `release`; el resto termina de inmediato.
    #[derive(Debug, Default)]
    struct Gated {
        release: Notify,
    }

    #[async_trait]
    impl FanOutDefinition for Gated {
        fn id(&self) -> &str {
            "gated"
        }

        fn plan(&self, _inputs: &StageInputs, _config: &RunConfig) -> Result<Vec<Value>, StageError> {
            Ok(vec![json!(0), json!(1)])
        }

        async fn run_task(&self, ctx: TaskContext) -> StageRunResult {
            if ctx.index == 0 {
                self.release.notified().await;
            }
            StageRunResult::Success { output: StageOutput::new(Artifact::json(ctx.input), RunStats::default()) }
        }
    }

    fn status(table: &Mutex<TaskTable>, index: usize) -> Option<TaskStatus> {
        table.lock().unwrap().status(index)
    }

    #[tokio::test]
    async fn queued_tasks_stay_pending_until_admitted() {
        let gated = Arc::new(Gated::default());
        let table = Arc::new(Mutex::new(TaskTable::new(2)));
        let ctx = StageContext { cache: CacheEngine::in_memory(),
                                 config: Arc::new(RunConfig::default()),
                                 inputs: Arc::new(StageInputs::default()),
                                 run: RunParams { seed: 0, choice: None } };

        let running = tokio::spawn(settle_all(gated.clone() as Arc<dyn FanOutDefinition>,
                                              ctx,
                                              vec![json!(0), json!(1)],
                                              Some(1),
                                              Arc::clone(&table),
                                              Arc::new(InMemoryEventStore::default()),
                                              Uuid::new_v4()));

        // Espera a que la tarea 0 tome el único permiso.
        while status(&table, 0) != Some(TaskStatus::Running) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(status(&table, 1), Some(TaskStatus::Pending));

        gated.release.notify_one();
        let settled = running.await.unwrap();
        assert!(settled.iter().all(Result::is_ok));
        assert_eq!(status(&table, 1), Some(TaskStatus::Running));
    }
}
