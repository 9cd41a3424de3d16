use futures_workpool::{PoolConfig, Task, TaskError, WorkerPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn my_task_fn(task: Task<u64>) -> Result<String, TaskError> {
  let (id, delay_ms) = task.into_parts();
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  Ok(format!("Task {} finished successfully after {}ms", id, delay_ms))
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let config = PoolConfig::new("basic_pool").worker_count(2).queue_capacity(10);
  let pool = WorkerPool::new(config, Handle::current(), my_task_fn).expect("Invalid pool configuration");

  for i in 0..5u64 {
    // Alternate sleep times for variety
    let sleep_duration = 500 + (i % 3 * 250);
    match pool.submit(Task::new(i, sleep_duration)).await {
      Ok(()) => info!("Submitted task {}", i),
      Err(e) => tracing::error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  info!("All tasks submitted. Awaiting completion...");
  pool.await_idle().await;

  let results = pool.results();
  while let Ok(result) = results.try_recv() {
    match result.outcome() {
      Ok(message) => info!("Result for task {}: {}", result.task_id(), message),
      Err(e) => info!("Error for task {}: {}", result.task_id(), e),
    }
  }

  info!("All task results processed. Shutting down pool.");
  pool.shutdown();
  pool.wait_stopped().await;
  info!("Pool shutdown complete.");
  info!("--- Basic Usage Example End ---");
}
