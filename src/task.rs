use crate::error::TaskError;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The future a work function resolves to once it has processed a task.
pub type TaskFuture<V> = Pin<Box<dyn Future<Output = Result<V, TaskError>> + Send + 'static>>;

/// Type-erased work function shared by every worker of a pool.
pub(crate) type WorkFn<P, V> = Arc<dyn Fn(Task<P>) -> TaskFuture<V> + Send + Sync + 'static>;

/// An immutable unit of work submitted to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<P> {
  id: u64,
  payload: P,
}

impl<P> Task<P> {
  pub fn new(id: u64, payload: P) -> Self {
    Self { id, payload }
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn payload(&self) -> &P {
    &self.payload
  }

  pub fn into_payload(self) -> P {
    self.payload
  }

  pub fn into_parts(self) -> (u64, P) {
    (self.id, self.payload)
  }
}

/// The outcome of executing one [`Task`]. Exactly one is produced per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult<V> {
  task_id: u64,
  outcome: Result<V, TaskError>,
}

impl<V> TaskResult<V> {
  pub(crate) fn new(task_id: u64, outcome: Result<V, TaskError>) -> Self {
    Self { task_id, outcome }
  }

  /// Id of the task this result was produced for.
  pub fn task_id(&self) -> u64 {
    self.task_id
  }

  pub fn is_ok(&self) -> bool {
    self.outcome.is_ok()
  }

  /// The produced value, if the task succeeded.
  pub fn value(&self) -> Option<&V> {
    self.outcome.as_ref().ok()
  }

  /// The captured failure, if the task failed or panicked.
  pub fn error(&self) -> Option<&TaskError> {
    self.outcome.as_ref().err()
  }

  pub fn outcome(&self) -> &Result<V, TaskError> {
    &self.outcome
  }

  pub fn into_outcome(self) -> Result<V, TaskError> {
    self.outcome
  }
}
