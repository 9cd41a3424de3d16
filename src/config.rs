use crate::error::PoolError;

use std::num::NonZeroUsize;
use std::thread;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Construction parameters for a [`WorkerPool`](crate::WorkerPool).
///
/// Worker count and channel capacities are fixed for the lifetime of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  pub(crate) name: String,
  pub(crate) worker_count: usize,
  pub(crate) queue_capacity: usize,
  pub(crate) result_capacity: Option<usize>,
}

impl PoolConfig {
  /// Starts from defaults: one worker per available core, a task queue of 64,
  /// and a result channel as large as the task queue.
  pub fn new(name: impl Into<String>) -> Self {
    let worker_count = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    Self {
      name: name.into(),
      worker_count,
      queue_capacity: DEFAULT_QUEUE_CAPACITY,
      result_capacity: None,
    }
  }

  pub fn worker_count(mut self, worker_count: usize) -> Self {
    self.worker_count = worker_count;
    self
  }

  pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
    self.queue_capacity = queue_capacity;
    self
  }

  /// Capacity of the result channel. Workers wait on a full result channel,
  /// so results must be consumed (or this sized for the whole batch) for
  /// [`WorkerPool::await_idle`](crate::WorkerPool::await_idle) to return.
  pub fn result_capacity(mut self, result_capacity: usize) -> Self {
    self.result_capacity = Some(result_capacity);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn effective_result_capacity(&self) -> usize {
    self.result_capacity.unwrap_or(self.queue_capacity)
  }

  /// # Errors
  /// Returns `PoolError::InvalidConfig` if the worker count or either
  /// capacity is zero.
  pub fn validate(&self) -> Result<(), PoolError> {
    if self.worker_count == 0 {
      return Err(PoolError::InvalidConfig("worker_count must be greater than zero".to_string()));
    }
    if self.queue_capacity == 0 {
      return Err(PoolError::InvalidConfig("queue_capacity must be greater than zero".to_string()));
    }
    if self.effective_result_capacity() == 0 {
      return Err(PoolError::InvalidConfig("result_capacity must be greater than zero".to_string()));
    }
    Ok(())
  }
}
