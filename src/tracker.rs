use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::trace;

/// A counting barrier: callers can wait until every tracked unit of work
/// has completed.
///
/// Each instance is owned explicitly (a pool holds its own behind an `Arc`);
/// there is no process-wide counter.
#[derive(Debug, Default)]
pub struct CompletionTracker {
  pending: AtomicUsize,
  idle: Notify,
}

impl CompletionTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records one more outstanding unit of work.
  pub fn increment(&self) {
    self.pending.fetch_add(1, Ordering::AcqRel);
  }

  /// Records that one unit of work has completed, waking all waiters when
  /// nothing remains outstanding.
  ///
  /// # Panics
  /// Panics if called more times than [`increment`](Self::increment). A
  /// negative count means the caller's bookkeeping is broken.
  pub fn decrement(&self) {
    let previous = self
      .pending
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| pending.checked_sub(1));
    match previous {
      Ok(1) => {
        trace!("Completion tracker reached zero, waking waiters.");
        self.idle.notify_waiters();
      }
      Ok(_) => {}
      Err(_) => panic!("CompletionTracker::decrement called with no pending work"),
    }
  }

  /// Current number of outstanding units of work.
  pub fn pending(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }

  pub fn is_idle(&self) -> bool {
    self.pending() == 0
  }

  /// Waits until the pending count is zero. Returns immediately if it already is.
  pub async fn wait(&self) {
    loop {
      let notified = self.idle.notified();
      tokio::pin!(notified);
      // Registered before the load, so a decrement to zero racing with us still wakes us.
      notified.as_mut().enable();

      if self.pending() == 0 {
        return;
      }

      notified.await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_wait_returns_immediately_when_idle() {
    let tracker = CompletionTracker::new();
    tokio::time::timeout(Duration::from_millis(50), tracker.wait())
      .await
      .expect("wait() should not block on an idle tracker");
  }

  #[tokio::test]
  async fn test_wait_blocks_until_zero() {
    let tracker = Arc::new(CompletionTracker::new());
    assert!(tracker.is_idle());
    tracker.increment();
    tracker.increment();
    assert!(!tracker.is_idle());

    let wait_future = tracker.wait();
    tokio::pin!(wait_future);

    tokio::select! {
        _ = &mut wait_future => panic!("wait() returned with work still pending"),
        _ = tokio::time::sleep(Duration::from_millis(30)) => {}
    }

    tracker.decrement();
    assert_eq!(tracker.pending(), 1);
    tokio::select! {
        _ = &mut wait_future => panic!("wait() returned with one unit still pending"),
        _ = tokio::time::sleep(Duration::from_millis(30)) => {}
    }

    tracker.decrement();
    tokio::time::timeout(Duration::from_millis(100), wait_future)
      .await
      .expect("wait() did not return after the count reached zero");
    assert!(tracker.is_idle());
  }

  #[test]
  #[should_panic(expected = "no pending work")]
  fn test_decrement_below_zero_panics() {
    let tracker = CompletionTracker::new();
    tracker.decrement();
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_increment_decrement_net_zero() {
    let tracker = Arc::new(CompletionTracker::new());
    let threads: usize = 8;
    let per_thread: usize = 1_000;

    let mut handles = Vec::new();
    for _ in 0..threads {
      let tracker = tracker.clone();
      handles.push(std::thread::spawn(move || {
        for _ in 0..per_thread {
          // Pair each decrement with a preceding increment so the count never dips below zero.
          tracker.increment();
          tracker.decrement();
        }
      }));
    }

    let waiter = {
      let tracker = tracker.clone();
      tokio::spawn(async move { tracker.wait().await })
    };

    for handle in handles {
      handle.join().unwrap();
    }

    tokio::time::timeout(Duration::from_secs(2), waiter)
      .await
      .expect("waiter never observed the tracker reaching zero")
      .unwrap();
    assert_eq!(tracker.pending(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_many_waiters_all_woken() {
    let tracker = Arc::new(CompletionTracker::new());
    tracker.increment();

    let waiters: Vec<_> = (0..5)
      .map(|_| {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.wait().await })
      })
      .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    tracker.decrement();

    for waiter in waiters {
      tokio::time::timeout(Duration::from_millis(200), waiter)
        .await
        .expect("a waiter missed the wakeup")
        .unwrap();
    }
  }
}
