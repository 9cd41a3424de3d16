use std::fmt;

use thiserror::Error;

/// Errors returned by pool-level operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool is draining or stopped, cannot accept new tasks")]
  PoolStopped,

  #[error("Pool's task queue is at capacity")]
  QueueFull,

  #[error("Invalid pool configuration: {0}")]
  InvalidConfig(String),
}

/// Failure of a single task, carried inside its [`TaskResult`](crate::TaskResult).
///
/// A task failure never crosses the worker boundary as a panic or an `Err`
/// from a pool method; it is only observable on the result value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
  #[error("Task failed: {0}")]
  Failed(String),

  #[error("Task panicked: {0}")]
  Panicked(String),
}

impl TaskError {
  /// Builds a [`TaskError::Failed`] from anything displayable.
  pub fn failed(reason: impl fmt::Display) -> Self {
    TaskError::Failed(reason.to_string())
  }
}

impl From<String> for TaskError {
  fn from(reason: String) -> Self {
    TaskError::Failed(reason)
  }
}

impl From<&str> for TaskError {
  fn from(reason: &str) -> Self {
    TaskError::Failed(reason.to_string())
  }
}

/// Returned by [`Channel::send`](crate::Channel::send) when the channel is closed.
/// The rejected item is handed back.
#[derive(Error, PartialEq, Eq)]
pub enum SendError<T> {
  #[error("Channel is closed")]
  Closed(T),
}

impl<T> SendError<T> {
  /// Takes back the item that could not be sent.
  pub fn into_inner(self) -> T {
    match self {
      SendError::Closed(item) => item,
    }
  }
}

impl<T> fmt::Debug for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SendError::Closed(_) => f.write_str("Closed(..)"),
    }
  }
}

/// Returned by [`Channel::try_send`](crate::Channel::try_send).
#[derive(Error, PartialEq, Eq)]
pub enum TrySendError<T> {
  #[error("Channel is full")]
  Full(T),

  #[error("Channel is closed")]
  Closed(T),
}

impl<T> TrySendError<T> {
  /// Takes back the item that could not be sent.
  pub fn into_inner(self) -> T {
    match self {
      TrySendError::Full(item) | TrySendError::Closed(item) => item,
    }
  }

  pub fn is_full(&self) -> bool {
    matches!(self, TrySendError::Full(_))
  }

  pub fn is_closed(&self) -> bool {
    matches!(self, TrySendError::Closed(_))
  }
}

impl<T> fmt::Debug for TrySendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TrySendError::Full(_) => f.write_str("Full(..)"),
      TrySendError::Closed(_) => f.write_str("Closed(..)"),
    }
  }
}

impl<T> From<SendError<T>> for TrySendError<T> {
  fn from(err: SendError<T>) -> Self {
    TrySendError::Closed(err.into_inner())
  }
}

/// Returned by [`Channel::try_recv`](crate::Channel::try_recv).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
  /// Nothing queued yet, but the channel is still open.
  #[error("Channel is empty, receiving would block")]
  WouldBlock,

  /// The channel is closed and every queued item has been received.
  #[error("Channel is closed and drained")]
  Empty,
}
