//! Delays a rapidly changing value until it has been stable for a while.
//!
//! Each [`Debouncer::set`] cancels the pending timer and starts a new one,
//! so only the last value of a burst comes out, one delay after the burst
//! ends. Settled values are read without blocking from the UI tick with
//! [`Debouncer::poll`]. Dropping the debouncer aborts the pending timer.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub struct Debouncer<T> {
  delay: Duration,
  tx: mpsc::UnboundedSender<T>,
  rx: mpsc::UnboundedReceiver<T>,
  pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
  pub fn new(delay: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      delay,
      tx,
      rx,
      pending: None,
    }
  }

  /// Record a new input value, restarting the quiet period.
  pub fn set(&mut self, value: T) {
    self.cancel();
    // A settled value nobody read yet is superseded too
    while self.rx.try_recv().is_ok() {}

    // Deadline is taken now, not when the task first runs
    let deadline = Instant::now() + self.delay;
    let tx = self.tx.clone();
    self.pending = Some(tokio::spawn(async move {
      sleep_until(deadline).await;
      // Ignore send errors - the debouncer may be gone
      let _ = tx.send(value);
    }));
  }

  /// Drop the pending value, if any, without emitting it.
  pub fn cancel(&mut self) {
    if let Some(handle) = self.pending.take() {
      handle.abort();
    }
  }

  /// Whether a value is waiting for its quiet period to end
  pub fn is_pending(&self) -> bool {
    self
      .pending
      .as_ref()
      .map(|handle| !handle.is_finished())
      .unwrap_or(false)
  }

  /// Latest settled value, if one arrived since the last poll.
  pub fn poll(&mut self) -> Option<T> {
    let mut latest = None;
    while let Ok(value) = self.rx.try_recv() {
      latest = Some(value);
    }
    if latest.is_some() && !self.is_pending() {
      self.pending = None;
    }
    latest
  }
}

impl<T> Drop for Debouncer<T> {
  fn drop(&mut self) {
    if let Some(handle) = self.pending.take() {
      handle.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use tokio::time::advance;

  const DELAY: Duration = Duration::from_millis(500);

  /// Let spawned timer tasks observe the current (paused) time.
  async fn settle() {
    for _ in 0..4 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_emits_last_value_once_after_quiet_period() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(DELAY);

    debouncer.set("j");
    advance(Duration::from_millis(100)).await;
    debouncer.set("jo");
    advance(Duration::from_millis(100)).await;
    debouncer.set("joh");

    advance(Duration::from_millis(499)).await;
    settle().await;
    assert_eq!(debouncer.poll(), None);

    advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(debouncer.poll(), Some("joh"));
    assert_eq!(start.elapsed(), Duration::from_millis(700));

    // Nothing else was queued
    settle().await;
    assert_eq!(debouncer.poll(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_poll_is_empty_until_delay_elapses() {
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.set(1);

    advance(Duration::from_millis(499)).await;
    settle().await;
    assert_eq!(debouncer.poll(), None);
    assert!(debouncer.is_pending());

    advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(debouncer.poll(), Some(1));
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_separate_bursts_emit_separately() {
    let mut debouncer = Debouncer::new(DELAY);

    debouncer.set("a");
    advance(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(debouncer.poll(), Some("a"));

    debouncer.set("b");
    advance(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(debouncer.poll(), Some("b"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_drops_pending_value() {
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.set("stale");
    debouncer.cancel();

    advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(debouncer.poll(), None);
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_aborts_pending_timer() {
    let value = Arc::new("typed");
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.set(Arc::clone(&value));
    settle().await;
    // The timer task holds the value until its deadline
    assert_eq!(Arc::strong_count(&value), 2);

    advance(Duration::from_millis(100)).await;
    drop(debouncer);
    settle().await;
    assert_eq!(Arc::strong_count(&value), 1);

    advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(Arc::strong_count(&value), 1);
  }
}
