use futures_workpool::{PoolConfig, Task, TaskError, WorkerPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn work_task_fn(task: Task<u64>) -> Result<String, TaskError> {
  let (id, duration_ms) = task.into_parts();
  info!("Task {} starting (will run for {}ms)", id, duration_ms);
  tokio::time::sleep(Duration::from_millis(duration_ms)).await;
  Ok(format!("Task {} finished after {}ms", id, duration_ms))
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Graceful Shutdown Example ---");

  let config = PoolConfig::new("graceful_shutdown_pool").worker_count(2).queue_capacity(10);
  let pool = WorkerPool::new(config, Handle::current(), work_task_fn).expect("Invalid pool configuration");

  // Consume results as they arrive; the channel closes once the pool has stopped.
  let results = pool.results();
  let consumer = tokio::spawn(async move {
    while let Some(result) = results.recv().await {
      info!("Task {} outcome: {:?}", result.task_id(), result.outcome());
    }
    info!("Result channel closed.");
  });

  // With 2 workers, tasks 0 and 1 start and tasks 2, 3, 4 wait in the queue.
  for i in 0..5u64 {
    if let Err(e) = pool.submit(Task::new(i, 1_000)).await {
      tracing::error!("Failed to submit task {}: {:?}", i, e);
    }
  }
  info!("All 5 tasks submitted. Queued: {}", pool.queued_task_count());

  tokio::time::sleep(Duration::from_millis(100)).await;
  info!("Calling pool.shutdown()...");
  pool.shutdown();
  info!("Pool state after shutdown call: {:?}", pool.state());

  info!("Attempting to submit task after shutdown initiated...");
  match pool.submit(Task::new(99, 100)).await {
    Ok(()) => tracing::error!("LATE SUBMISSION SUCCEEDED (UNEXPECTED!)"),
    Err(e) => info!("Late submission correctly failed: {}", e),
  }

  // Queued tasks are still drained before the workers exit.
  pool.wait_stopped().await;
  info!("Pool state: {:?}, worker states: {:?}", pool.state(), pool.worker_states());
  consumer.await.expect("Result consumer panicked");

  info!("--- Graceful Shutdown Example End ---");
}
