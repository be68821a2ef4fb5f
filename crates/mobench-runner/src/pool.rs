//! Suite execution over a pool of environments.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use mobench_client::Env;

use crate::agent::Agent;
use crate::report::{RunReport, TaskRecord};
use crate::runner::{run_single_task, EpisodeOutcome, RunnerConfig};

struct QueueItem {
    task_name: String,
    attempts: u32,
}

/// Run every task in `task_names` across the given environments.
///
/// Each environment drains the shared queue until it is empty or the
/// environment is evicted. An evicted environment's in-flight task goes back
/// on the queue once; tasks still queued when every environment is gone are
/// recorded as failures, so the report always has one record per task.
pub async fn run_suite<F>(
    envs: Vec<Box<dyn Env>>,
    make_agent: F,
    task_names: &[String],
    config: RunnerConfig,
) -> RunReport
where
    F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
{
    let queue: Arc<Mutex<VecDeque<QueueItem>>> = Arc::new(Mutex::new(
        task_names
            .iter()
            .map(|name| QueueItem {
                task_name: name.clone(),
                attempts: 0,
            })
            .collect(),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskRecord>();
    let make_agent = Arc::new(make_agent);

    info!(
        tasks = task_names.len(),
        environments = envs.len(),
        "Suite run started"
    );

    let mut workers = Vec::new();
    for mut env in envs {
        let queue = queue.clone();
        let tx = tx.clone();
        let make_agent = make_agent.clone();
        let config = config.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let item = queue.lock().await.pop_front();
                let Some(item) = item else { break };

                let mut agent = make_agent();
                let outcome =
                    run_single_task(env.as_mut(), agent.as_mut(), &item.task_name, &config).await;
                match outcome {
                    EpisodeOutcome::Completed(record) => {
                        let _ = tx.send(record);
                    }
                    EpisodeOutcome::Evicted => {
                        if config.reschedule_on_eviction && item.attempts == 0 {
                            warn!(task = %item.task_name, "Rescheduling after eviction");
                            queue.lock().await.push_back(QueueItem {
                                task_name: item.task_name,
                                attempts: item.attempts + 1,
                            });
                        } else {
                            let _ = tx.send(TaskRecord::failed(
                                &item.task_name,
                                "environment evicted",
                            ));
                        }
                        // This environment is done.
                        break;
                    }
                }
            }
        }));
    }
    drop(tx);

    for worker in workers {
        // A panicked worker loses its environment, not the run.
        if let Err(error) = worker.await {
            warn!(error = %error, "Worker panicked");
        }
    }

    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }

    // Tasks stranded by evictions still get a record.
    let mut leftovers = queue.lock().await;
    while let Some(item) = leftovers.pop_front() {
        records.push(TaskRecord::failed(
            &item.task_name,
            "no healthy environment available",
        ));
    }

    let report = RunReport::new(records);
    info!(
        run_id = %report.run_id,
        mean_score = report.mean_score(),
        "Suite run finished"
    );
    report
}
