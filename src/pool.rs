use crate::channel::Channel;
use crate::config::PoolConfig;
use crate::error::{PoolError, TaskError, TrySendError};
use crate::task::{Task, TaskFuture, TaskResult, WorkFn};
use crate::tracker::CompletionTracker;
use crate::worker::{Worker, WorkerState};

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Lifecycle of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
  /// Accepting submissions.
  Running,
  /// Shutdown requested: no new submissions, workers draining the queue.
  Draining,
  /// Every worker has exited.
  Stopped,
}

/// State shared between the pool handle and its workers.
pub(crate) struct PoolShared {
  pub(crate) name: Arc<String>,
  state: Mutex<PoolState>,
  worker_states: DashMap<usize, WorkerState>,
  live_workers: AtomicUsize,
  stopped: CancellationToken,
}

impl PoolShared {
  pub(crate) fn set_worker_state(&self, worker_id: usize, state: WorkerState) {
    self.worker_states.insert(worker_id, state);
  }

  /// Returns `true` for the last worker to exit.
  pub(crate) fn worker_exited(&self, worker_id: usize) -> bool {
    self.set_worker_state(worker_id, WorkerState::Stopped);
    self.live_workers.fetch_sub(1, AtomicOrdering::AcqRel) == 1
  }

  pub(crate) fn mark_stopped(&self) {
    *self.state.lock() = PoolState::Stopped;
    info!(pool_name = %*self.name, "All workers exited. Pool stopped.");
    self.stopped.cancel();
  }
}

/// A fixed-size group of workers fed through a bounded task queue.
///
/// Tasks go in through [`submit`](Self::submit), results come out of the
/// channel returned by [`results`](Self::results). [`await_idle`](Self::await_idle)
/// waits for every submitted task to produce its result, and
/// [`shutdown`](Self::shutdown) stops intake while letting workers drain
/// whatever is already queued.
pub struct WorkerPool<P: Send + 'static, V: Send + 'static> {
  shared: Arc<PoolShared>,
  input: Channel<Task<P>>,
  output: Channel<TaskResult<V>>,
  tracker: Arc<CompletionTracker>,
  worker_count: usize,
  next_task_id: AtomicU64,
  worker_join_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Send + 'static, V: Send + 'static> WorkerPool<P, V> {
  /// Creates the pool and spawns `config.worker_count` workers on `tokio_handle`.
  ///
  /// `work_fn` runs once per task. An `Err` it returns, or a panic inside it,
  /// is recorded on that task's [`TaskResult`] and never stops the worker.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfig` if the configuration has a zero
  /// worker count or capacity.
  pub fn new<F, Fut>(config: PoolConfig, tokio_handle: TokioHandle, work_fn: F) -> Result<Arc<Self>, PoolError>
  where
    F: Fn(Task<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
  {
    config.validate()?;
    let input = Channel::new(config.queue_capacity)?;
    let output = Channel::new(config.effective_result_capacity())?;
    let tracker = Arc::new(CompletionTracker::new());
    let work_fn: WorkFn<P, V> = Arc::new(move |task: Task<P>| -> TaskFuture<V> { Box::pin(work_fn(task)) });

    let shared = Arc::new(PoolShared {
      name: Arc::new(config.name.clone()),
      state: Mutex::new(PoolState::Running),
      worker_states: DashMap::new(),
      live_workers: AtomicUsize::new(config.worker_count),
      stopped: CancellationToken::new(),
    });

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
      shared.set_worker_state(worker_id, WorkerState::Idle);
      let worker = Worker {
        id: worker_id,
        shared: shared.clone(),
        input: input.clone(),
        output: output.clone(),
        tracker: tracker.clone(),
        work_fn: work_fn.clone(),
      };
      handles.push(
        tokio_handle.spawn(
          worker
            .run()
            .instrument(info_span!("worker_loop", pool_name = %config.name, worker_id)),
        ),
      );
    }

    info!(
      pool_name = %config.name,
      workers = config.worker_count,
      queue_capacity = config.queue_capacity,
      result_capacity = config.effective_result_capacity(),
      "Worker pool created."
    );

    Ok(Arc::new(Self {
      shared,
      input,
      output,
      tracker,
      worker_count: config.worker_count,
      next_task_id: AtomicU64::new(0),
      worker_join_handles: Mutex::new(handles),
    }))
  }

  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn state(&self) -> PoolState {
    *self.shared.state.lock()
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  /// Snapshot of every worker's state, ordered by worker id.
  pub fn worker_states(&self) -> Vec<(usize, WorkerState)> {
    let mut states: Vec<(usize, WorkerState)> = self
      .shared
      .worker_states
      .iter()
      .map(|entry| (*entry.key(), *entry.value()))
      .collect();
    states.sort_unstable_by_key(|(worker_id, _)| *worker_id);
    states
  }

  /// Tasks submitted whose results have not been produced yet.
  pub fn pending_task_count(&self) -> usize {
    self.tracker.pending()
  }

  /// Tasks waiting in the queue for a worker.
  pub fn queued_task_count(&self) -> usize {
    self.input.len()
  }

  /// Submits a task, waiting for a free queue slot if the queue is full.
  ///
  /// # Errors
  /// Returns `PoolError::PoolStopped` if [`shutdown`](Self::shutdown) has
  /// been called, including when shutdown happens while this call waits
  /// for a slot. A rejected task is not counted as pending.
  pub async fn submit(&self, task: Task<P>) -> Result<(), PoolError> {
    if self.state() != PoolState::Running {
      warn!(pool_name = %*self.shared.name, task_id = task.id(), "Submit: Attempted to submit task to a pool that is draining or stopped.");
      return Err(PoolError::PoolStopped);
    }

    let task_id = task.id();
    // Counted before it is enqueued so `await_idle` never sees a false zero.
    self.tracker.increment();
    debug!(pool_name = %*self.shared.name, %task_id, "Submitting task to queue.");

    match self.input.send(task).await {
      Ok(()) => Ok(()),
      Err(_rejected) => {
        self.tracker.decrement();
        warn!(pool_name = %*self.shared.name, %task_id, "Submit: Task queue closed by shutdown while waiting for a slot.");
        Err(PoolError::PoolStopped)
      }
    }
  }

  /// Submits a task only if a queue slot is free right now.
  ///
  /// # Errors
  /// `PoolError::QueueFull` if the queue is at capacity, `PoolError::PoolStopped`
  /// if the pool is draining or stopped.
  pub fn try_submit(&self, task: Task<P>) -> Result<(), PoolError> {
    if self.state() != PoolState::Running {
      warn!(pool_name = %*self.shared.name, task_id = task.id(), "Try-submit: Pool is draining or stopped.");
      return Err(PoolError::PoolStopped);
    }

    let task_id = task.id();
    self.tracker.increment();
    match self.input.try_send(task) {
      Ok(()) => {
        debug!(pool_name = %*self.shared.name, %task_id, "Task queued without waiting.");
        Ok(())
      }
      Err(TrySendError::Full(_)) => {
        self.tracker.decrement();
        trace!(pool_name = %*self.shared.name, %task_id, "Try-submit: Task queue is full.");
        Err(PoolError::QueueFull)
      }
      Err(TrySendError::Closed(_)) => {
        self.tracker.decrement();
        warn!(pool_name = %*self.shared.name, %task_id, "Try-submit: Task queue closed by shutdown.");
        Err(PoolError::PoolStopped)
      }
    }
  }

  /// Wraps `payload` in a task with the next pool-assigned id and submits it.
  ///
  /// Ids start at 0 and increase per pool. Mixing this with
  /// [`submit`](Self::submit) of caller-chosen ids may produce duplicates.
  ///
  /// # Errors
  /// Same as [`submit`](Self::submit).
  pub async fn submit_payload(&self, payload: P) -> Result<u64, PoolError> {
    let task_id = self.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
    self.submit(Task::new(task_id, payload)).await.map(|()| task_id)
  }

  /// Waits until every submitted task has produced its result.
  ///
  /// The pool stays open; more work may be submitted afterwards. Workers
  /// wait on a full result channel, so results must be consumed unless the
  /// result channel can hold the whole batch.
  pub async fn await_idle(&self) {
    trace!(pool_name = %*self.shared.name, pending = self.tracker.pending(), "Awaiting pool idle.");
    self.tracker.wait().await;
  }

  /// Stops accepting tasks and closes the task queue. Does not wait.
  ///
  /// Workers finish everything already queued and then exit; the pool
  /// reaches [`PoolState::Stopped`] when the last one does. Idempotent.
  pub fn shutdown(&self) {
    let initiated = {
      let mut state = self.shared.state.lock();
      if *state == PoolState::Running {
        *state = PoolState::Draining;
        true
      } else {
        false
      }
    };

    if initiated {
      info!(
        pool_name = %*self.shared.name,
        queued = self.input.len(),
        "Initiating pool shutdown. Workers will drain the queue."
      );
      self.input.close();
    } else {
      debug!(pool_name = %*self.shared.name, "Shutdown already in progress or completed.");
    }
  }

  /// Waits until every worker has exited and joins their tasks.
  ///
  /// Only returns after [`shutdown`](Self::shutdown) has been called. Also waits
  /// for submissions rejected by the shutdown to drop their pending count, so
  /// [`pending_task_count`](Self::pending_task_count) reads zero afterwards.
  pub async fn wait_stopped(&self) {
    self.shared.stopped.cancelled().await;
    self.tracker.wait().await;

    let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.worker_join_handles.lock());
    for handle in handles {
      if let Err(join_error) = handle.await {
        error!(pool_name = %*self.shared.name, "Error joining worker task: {:?}", join_error);
      }
    }
    trace!(pool_name = %*self.shared.name, "Worker tasks joined.");
  }

  /// A handle to the result channel.
  ///
  /// The channel is closed once the pool is stopped, so consumers can read
  /// until `recv` returns `None`.
  pub fn results(&self) -> Channel<TaskResult<V>> {
    self.output.clone()
  }
}

impl<P: Send + 'static, V: Send + 'static> Drop for WorkerPool<P, V> {
  fn drop(&mut self) {
    if self.state() == PoolState::Running {
      info!(
        pool_name = %*self.shared.name,
        "WorkerPool dropped while running. Initiating implicit shutdown."
      );
      self.shutdown();
    } else {
      trace!(pool_name = %*self.shared.name, "Drop: Shutdown already in progress or completed.");
    }
  }
}
