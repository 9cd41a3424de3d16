use crate::channel::Channel;
use crate::error::TaskError;
use crate::pool::PoolShared;
use crate::task::{Task, TaskResult, WorkFn};
use crate::tracker::CompletionTracker;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
  /// Waiting on the task queue.
  Idle,
  /// Executing a task.
  Running,
  /// Exited after the task queue was closed and drained.
  Stopped,
}

pub(crate) struct Worker<P: Send + 'static, V: Send + 'static> {
  pub(crate) id: usize,
  pub(crate) shared: Arc<PoolShared>,
  pub(crate) input: Channel<Task<P>>,
  pub(crate) output: Channel<TaskResult<V>>,
  pub(crate) tracker: Arc<CompletionTracker>,
  pub(crate) work_fn: WorkFn<P, V>,
}

/// Reports the worker's exit to the pool even if the loop unwinds.
/// The last worker out closes the result channel before marking the pool stopped.
struct ExitGuard<V: Send + 'static> {
  worker_id: usize,
  shared: Arc<PoolShared>,
  output: Channel<TaskResult<V>>,
}

impl<V: Send + 'static> Drop for ExitGuard<V> {
  fn drop(&mut self) {
    if self.shared.worker_exited(self.worker_id) {
      self.output.close();
      self.shared.mark_stopped();
    }
  }
}

impl<P: Send + 'static, V: Send + 'static> Worker<P, V> {
  /// Pulls tasks until the input channel is closed and drained.
  ///
  /// That is the only way out: task failures and panics are turned into
  /// results and the loop continues.
  pub(crate) async fn run(self) {
    let _exit_guard = ExitGuard {
      worker_id: self.id,
      shared: self.shared.clone(),
      output: self.output.clone(),
    };
    info!(pool_name = %*self.shared.name, worker_id = self.id, "Worker started.");

    while let Some(task) = self.input.recv().await {
      self.shared.set_worker_state(self.id, WorkerState::Running);
      let task_id = task.id();
      debug!(pool_name = %*self.shared.name, worker_id = self.id, %task_id, "Dequeued task.");

      let outcome = self.execute(task).await;
      if self.output.send(TaskResult::new(task_id, outcome)).await.is_err() {
        warn!(
          pool_name = %*self.shared.name,
          worker_id = self.id,
          %task_id,
          "Result channel was closed by a consumer. Task result dropped."
        );
      }

      self.tracker.decrement();
      self.shared.set_worker_state(self.id, WorkerState::Idle);
    }

    info!(pool_name = %*self.shared.name, worker_id = self.id, "Task queue closed and drained. Worker stopping.");
  }

  async fn execute(&self, task: Task<P>) -> Result<V, TaskError> {
    let task_id = task.id();
    let work_fn = self.work_fn.clone();

    // The call itself happens inside the future so a panic before the
    // first await is caught too.
    match AssertUnwindSafe(async move { work_fn(task).await }).catch_unwind().await {
      Ok(Ok(value)) => {
        trace!(pool_name = %*self.shared.name, worker_id = self.id, %task_id, "Task executed successfully.");
        Ok(value)
      }
      Ok(Err(task_error)) => {
        debug!(
          pool_name = %*self.shared.name,
          worker_id = self.id,
          %task_id,
          error = %task_error,
          "Task returned an error."
        );
        Err(task_error)
      }
      Err(panic_payload) => {
        let message = panic_message(panic_payload.as_ref());
        error!(
          pool_name = %*self.shared.name,
          worker_id = self.id,
          %task_id,
          panic = %message,
          "Task panicked during execution."
        );
        Err(TaskError::Panicked(message))
      }
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
