use crate::error::{PoolError, SendError, TryRecvError, TrySendError};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

struct ChannelState<T> {
  items: VecDeque<T>,
  closed: bool,
}

struct Shared<T> {
  state: Mutex<ChannelState<T>>,
  capacity: usize,
  /// One permit per queued item, consumed by `recv`.
  not_empty: Notify,
  /// One permit per freed slot, consumed by `send`.
  not_full: Notify,
  /// Broadcast on every push and on close. Readiness waiters never consume
  /// the item-level permits above.
  ready: Notify,
}

/// A bounded, multi-producer, multi-consumer FIFO channel.
///
/// Cloning a `Channel` produces another handle to the same queue. The channel
/// is closed explicitly with [`close`](Self::close), not by dropping handles;
/// after closing, already queued items remain receivable until drained.
pub struct Channel<T> {
  shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("Channel")
      .field("len", &state.items.len())
      .field("capacity", &self.shared.capacity)
      .field("closed", &state.closed)
      .finish_non_exhaustive()
  }
}

impl<T> Channel<T> {
  /// Creates an open channel holding at most `capacity` items.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfig` if `capacity` is zero.
  pub fn new(capacity: usize) -> Result<Self, PoolError> {
    if capacity == 0 {
      return Err(PoolError::InvalidConfig("channel capacity must be greater than zero".to_string()));
    }
    Ok(Self {
      shared: Arc::new(Shared {
        state: Mutex::new(ChannelState {
          items: VecDeque::with_capacity(capacity),
          closed: false,
        }),
        capacity,
        not_empty: Notify::new(),
        not_full: Notify::new(),
        ready: Notify::new(),
      }),
    })
  }

  /// Sends an item, waiting while the channel is open and full.
  ///
  /// # Errors
  /// Returns `SendError::Closed` with the item if the channel is closed when
  /// called or becomes closed while waiting for a free slot.
  pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
    let mut item = item;
    loop {
      let notified = self.shared.not_full.notified();
      tokio::pin!(notified);
      // Register before inspecting the queue so a slot freed in between still wakes us.
      notified.as_mut().enable();

      match self.try_send(item) {
        Ok(()) => return Ok(()),
        Err(TrySendError::Closed(rejected)) => return Err(SendError::Closed(rejected)),
        Err(TrySendError::Full(rejected)) => item = rejected,
      }

      trace!(capacity = self.shared.capacity, "Channel full, sender waiting for a free slot.");
      notified.await;
    }
  }

  /// Sends an item without waiting.
  ///
  /// # Errors
  /// `TrySendError::Full` if the channel is at capacity, `TrySendError::Closed`
  /// if it is closed. Both hand the item back.
  pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    {
      let mut state = self.shared.state.lock();
      if state.closed {
        return Err(TrySendError::Closed(item));
      }
      if state.items.len() >= self.shared.capacity {
        return Err(TrySendError::Full(item));
      }
      state.items.push_back(item);
      assert!(
        state.items.len() <= self.shared.capacity,
        "channel holds more items than its capacity"
      );
    }
    self.shared.not_empty.notify_one();
    self.shared.ready.notify_waiters();
    Ok(())
  }

  /// Receives the oldest item, waiting while the channel is open and empty.
  ///
  /// Returns `None` once the channel is closed and drained. That is the
  /// end-of-stream signal, not an error.
  pub async fn recv(&self) -> Option<T> {
    loop {
      let notified = self.shared.not_empty.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      match self.try_recv() {
        Ok(item) => return Some(item),
        Err(TryRecvError::Empty) => return None,
        Err(TryRecvError::WouldBlock) => {}
      }

      notified.await;
    }
  }

  /// Receives the oldest item without waiting.
  ///
  /// # Errors
  /// `TryRecvError::WouldBlock` if the channel is empty but open,
  /// `TryRecvError::Empty` if it is empty and closed.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    let item = {
      let mut state = self.shared.state.lock();
      match state.items.pop_front() {
        Some(item) => item,
        None if state.closed => return Err(TryRecvError::Empty),
        None => return Err(TryRecvError::WouldBlock),
      }
    };
    self.shared.not_full.notify_one();
    Ok(item)
  }

  /// Waits until the channel holds at least one item or is closed.
  ///
  /// Does not consume anything, so another receiver may take the item
  /// before the caller gets to it.
  pub async fn readable(&self) {
    loop {
      let notified = self.shared.ready.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      {
        let state = self.shared.state.lock();
        if state.closed || !state.items.is_empty() {
          return;
        }
      }

      notified.await;
    }
  }

  /// Closes the channel. Queued items stay receivable.
  ///
  /// Idempotent. Returns `true` only for the call that actually closed it.
  pub fn close(&self) -> bool {
    let newly_closed = {
      let mut state = self.shared.state.lock();
      !std::mem::replace(&mut state.closed, true)
    };
    if newly_closed {
      trace!(capacity = self.shared.capacity, "Channel closed, waking all waiters.");
      self.shared.not_empty.notify_waiters();
      self.shared.not_full.notify_waiters();
      self.shared.ready.notify_waiters();
    }
    newly_closed
  }

  pub fn is_closed(&self) -> bool {
    self.shared.state.lock().closed
  }

  /// Number of items currently queued.
  pub fn len(&self) -> usize {
    self.shared.state.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.state.lock().items.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.shared.state.lock().items.len() >= self.shared.capacity
  }

  pub fn capacity(&self) -> usize {
    self.shared.capacity
  }

  /// Returns `true` if both handles refer to the same queue.
  pub fn same_channel(&self, other: &Channel<T>) -> bool {
    Arc::ptr_eq(&self.shared, &other.shared)
  }
}
