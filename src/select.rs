use crate::channel::Channel;
use crate::error::TryRecvError;

use std::fmt;

use futures::future::select_all;
use rand::Rng;
use tracing::trace;

/// What a [`MultiplexedReader`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected<T> {
  /// An item taken from the source at index `source`.
  Item { source: usize, item: T },
  /// Nothing was ready and the default action ran.
  Default,
  /// Every source is closed and drained; nothing will ever be ready again.
  Closed,
}

impl<T> Selected<T> {
  pub fn into_item(self) -> Option<T> {
    match self {
      Selected::Item { item, .. } => Some(item),
      Selected::Default | Selected::Closed => None,
    }
  }
}

enum Poll<T> {
  Ready(usize, T),
  /// Indices of the sources that are still open.
  Pending(Vec<usize>),
  AllClosed,
}

/// Takes the first ready item among several channels.
///
/// Each pass starts at a random source, so when several are ready at once
/// none is favoured over repeated calls. With a default action configured
/// [`select`](Self::select) never waits; without one it sleeps until some
/// source becomes readable and polls again.
pub struct MultiplexedReader<T> {
  sources: Vec<Channel<T>>,
  default: Option<Box<dyn FnMut() + Send + 'static>>,
}

impl<T> Default for MultiplexedReader<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for MultiplexedReader<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MultiplexedReader")
      .field("sources", &self.sources.len())
      .field("has_default", &self.default.is_some())
      .finish()
  }
}

impl<T> MultiplexedReader<T> {
  pub fn new() -> Self {
    Self {
      sources: Vec::new(),
      default: None,
    }
  }

  pub fn with_source(mut self, source: Channel<T>) -> Self {
    self.sources.push(source);
    self
  }

  /// Adds a source and returns the index it is reported under in [`Selected::Item`].
  pub fn add_source(&mut self, source: Channel<T>) -> usize {
    self.sources.push(source);
    self.sources.len() - 1
  }

  /// Action run by [`select`](Self::select) when no source is ready.
  pub fn with_default(mut self, action: impl FnMut() + Send + 'static) -> Self {
    self.default = Some(Box::new(action));
    self
  }

  pub fn clear_default(&mut self) {
    self.default = None;
  }

  pub fn source_count(&self) -> usize {
    self.sources.len()
  }

  fn poll_sources(&self) -> Poll<T> {
    let count = self.sources.len();
    if count == 0 {
      return Poll::AllClosed;
    }

    let start = if count > 1 { rand::rng().random_range(0..count) } else { 0 };
    let mut open = Vec::with_capacity(count);
    for offset in 0..count {
      let index = (start + offset) % count;
      match self.sources[index].try_recv() {
        Ok(item) => return Poll::Ready(index, item),
        Err(TryRecvError::WouldBlock) => open.push(index),
        Err(TryRecvError::Empty) => {}
      }
    }

    if open.is_empty() {
      Poll::AllClosed
    } else {
      Poll::Pending(open)
    }
  }

  /// One non-blocking pass over the sources.
  ///
  /// Returns `None` if nothing is ready. Never runs the default action.
  pub fn try_select(&self) -> Option<Selected<T>> {
    match self.poll_sources() {
      Poll::Ready(source, item) => Some(Selected::Item { source, item }),
      Poll::AllClosed => Some(Selected::Closed),
      Poll::Pending(_) => None,
    }
  }

  /// Takes the first ready item.
  ///
  /// If nothing is ready: runs the default action and returns
  /// [`Selected::Default`] when one is set, otherwise waits for a source to
  /// become readable. Returns [`Selected::Closed`] once every source is
  /// closed and drained, with or without a default.
  pub async fn select(&mut self) -> Selected<T> {
    loop {
      let open = match self.poll_sources() {
        Poll::Ready(source, item) => return Selected::Item { source, item },
        Poll::AllClosed => return Selected::Closed,
        Poll::Pending(open) => open,
      };

      if let Some(action) = self.default.as_mut() {
        trace!(sources = self.sources.len(), "No source ready, running default action.");
        action();
        return Selected::Default;
      }

      trace!(open_sources = open.len(), "No source ready, waiting for readiness.");
      // Closed and drained sources are always readable, so only open ones are awaited.
      // Another consumer may win the item we were woken for; polling again covers that.
      select_all(open.into_iter().map(|index| Box::pin(self.sources[index].readable()))).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_select_returns_ready_value_without_blocking() {
    let ready = Channel::new(1).unwrap();
    let empty = Channel::new(1).unwrap();
    ready.try_send(7).unwrap();

    let mut reader = MultiplexedReader::new().with_source(empty).with_source(ready);
    let selected = tokio::time::timeout(Duration::from_millis(50), reader.select())
      .await
      .expect("select() blocked although a source was ready");
    assert_eq!(selected, Selected::Item { source: 1, item: 7 });
  }

  #[tokio::test]
  async fn test_default_runs_when_nothing_ready() {
    let runs = Arc::new(AtomicUsize::new(0));
    let channel = Channel::<u8>::new(1).unwrap();
    let mut reader = MultiplexedReader::new().with_source(channel.clone()).with_default({
      let runs = runs.clone();
      move || {
        runs.fetch_add(1, Ordering::SeqCst);
      }
    });

    assert_eq!(reader.select().await, Selected::Default);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    channel.try_send(3).unwrap();
    assert_eq!(reader.select().await, Selected::Item { source: 0, item: 3 });
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_try_select_never_runs_default() {
    let runs = Arc::new(AtomicUsize::new(0));
    let reader = MultiplexedReader::new()
      .with_source(Channel::<u8>::new(1).unwrap())
      .with_default({
        let runs = runs.clone();
        move || {
          runs.fetch_add(1, Ordering::SeqCst);
        }
      });

    assert_eq!(reader.try_select(), None);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_closed_sources_report_closed() {
    let first = Channel::<u8>::new(1).unwrap();
    let second = Channel::<u8>::new(1).unwrap();
    second.try_send(1).unwrap();
    first.close();
    second.close();

    let mut reader = MultiplexedReader::new().with_source(first).with_source(second);
    assert_eq!(reader.select().await, Selected::Item { source: 1, item: 1 });
    assert_eq!(reader.select().await, Selected::Closed);

    let mut empty_reader = MultiplexedReader::<u8>::new();
    assert_eq!(empty_reader.select().await, Selected::Closed);
  }

  #[tokio::test]
  async fn test_select_without_default_waits_for_a_send() {
    let first = Channel::<u32>::new(1).unwrap();
    let second = Channel::<u32>::new(1).unwrap();
    let mut reader = MultiplexedReader::new()
      .with_source(first.clone())
      .with_source(second.clone());

    let select_future = reader.select();
    tokio::pin!(select_future);
    tokio::select! {
        _ = &mut select_future => panic!("select() returned with no source ready"),
        _ = tokio::time::sleep(Duration::from_millis(30)) => {}
    }

    second.try_send(42).unwrap();
    let selected = tokio::time::timeout(Duration::from_millis(200), select_future)
      .await
      .expect("select() was not woken by a send");
    assert_eq!(selected, Selected::Item { source: 1, item: 42 });
  }

  #[tokio::test]
  async fn test_ready_sources_are_all_selected_over_repeated_calls() {
    let first = Channel::new(4).unwrap();
    let second = Channel::new(4).unwrap();
    let mut reader = MultiplexedReader::new()
      .with_source(first.clone())
      .with_source(second.clone());
    let mut picks = [0usize; 2];

    for _ in 0..200 {
      // Keep both sources ready on every call.
      while first.try_send(0u8).is_ok() {}
      while second.try_send(1u8).is_ok() {}
      match reader.select().await {
        Selected::Item { source, .. } => picks[source] += 1,
        other => panic!("expected an item, got {:?}", other),
      }
    }

    assert!(picks[0] > 0, "first source was never selected");
    assert!(picks[1] > 0, "second source was never selected");
  }

  #[tokio::test]
  async fn test_drained_source_does_not_stop_waiting_on_open_one() {
    let drained = Channel::<u32>::new(1).unwrap();
    drained.close();
    let open = Channel::<u32>::new(1).unwrap();
    let mut reader = MultiplexedReader::new()
      .with_source(drained)
      .with_source(open.clone());

    let producer = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      open.send(42).await.unwrap();
    });

    let selected = tokio::time::timeout(Duration::from_millis(500), reader.select())
      .await
      .expect("select() never yielded to the producer");
    assert_eq!(selected, Selected::Item { source: 1, item: 42 });
    producer.await.unwrap();
  }

  #[tokio::test]
  async fn test_added_sources_report_their_index() {
    let mut reader = MultiplexedReader::new().with_default(|| {});
    let first = Channel::<u8>::new(1).unwrap();
    let second = Channel::<u8>::new(1).unwrap();
    assert_eq!(reader.add_source(first), 0);
    assert_eq!(reader.add_source(second.clone()), 1);
    assert_eq!(reader.source_count(), 2);

    assert_eq!(reader.select().await, Selected::Default);
    reader.clear_default();

    let select_future = reader.select();
    tokio::pin!(select_future);
    tokio::select! {
        _ = &mut select_future => panic!("select() returned although the default was cleared"),
        _ = tokio::time::sleep(Duration::from_millis(30)) => {}
    }
    second.try_send(9).unwrap();
    let selected = tokio::time::timeout(Duration::from_millis(200), select_future)
      .await
      .expect("select() was not woken by a send");
    assert_eq!(selected, Selected::Item { source: 1, item: 9 });
  }
}
