//! Sliding-window rate limiter shared by every registry call.
//!
//! Keeps the instants of recent admissions. `acquire` drops entries older
//! than the window; if the window is full it sleeps until the oldest entry
//! leaves it (plus a small buffer) and tries again. Callers are never
//! rejected, only delayed.

use std::{collections::VecDeque, time::Duration};

use tokio::{
  sync::Mutex,
  time::{Instant, sleep},
};

/// The registry's published budget: 600 requests per five minutes.
pub const REGISTRY_MAX_REQUESTS: usize = 600;
pub const REGISTRY_WINDOW: Duration = Duration::from_secs(300);

const SAFETY_BUFFER: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct RateLimiter {
  max_requests: usize,
  window:       Duration,
  history:      Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      max_requests: max_requests.max(1),
      window,
      history: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
    }
  }

  /// A limiter matching the registry's published budget.
  pub fn registry_default() -> Self { Self::new(REGISTRY_MAX_REQUESTS, REGISTRY_WINDOW) }

  pub fn max_requests(&self) -> usize { self.max_requests }

  pub fn window(&self) -> Duration { self.window }

  fn prune(&self, history: &mut VecDeque<Instant>, now: Instant) {
    while history
      .front()
      .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
    {
      history.pop_front();
    }
  }

  /// Wait until a slot is free, then claim it.
  ///
  /// Reading the history, deciding and recording the admission happen under
  /// one lock; the lock is released while sleeping. Dropping the future
  /// while it sleeps claims nothing.
  pub async fn acquire(&self) {
    loop {
      let wait = {
        let mut history = self.history.lock().await;
        let now = Instant::now();
        self.prune(&mut history, now);

        if history.len() < self.max_requests {
          history.push_back(now);
          return;
        }

        let oldest = history.front().copied().unwrap_or(now);
        (oldest + self.window).saturating_duration_since(now) + SAFETY_BUFFER
      };

      tracing::debug!(wait_ms = wait.as_millis() as u64, "registry rate limit reached, waiting");
      sleep(wait).await;
    }
  }

  /// Slots still free in the current window.
  pub async fn remaining(&self) -> usize {
    let mut history = self.history.lock().await;
    self.prune(&mut history, Instant::now());
    self.max_requests.saturating_sub(history.len())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn admits_up_to_budget_without_waiting() {
    let limiter = RateLimiter::new(3, Duration::from_secs(1));
    let start = Instant::now();
    for _ in 0..3 {
      limiter.acquire().await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.remaining().await, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn call_over_budget_is_delayed_not_rejected() {
    let limiter = RateLimiter::registry_default();
    let start = Instant::now();
    for _ in 0..REGISTRY_MAX_REQUESTS {
      limiter.acquire().await;
    }
    assert!(start.elapsed() < REGISTRY_WINDOW);

    limiter.acquire().await;
    assert!(start.elapsed() >= REGISTRY_WINDOW);
  }

  #[tokio::test(start_paused = true)]
  async fn window_slides() {
    let limiter = RateLimiter::new(2, Duration::from_secs(10));
    limiter.acquire().await;
    sleep(Duration::from_secs(6)).await;
    limiter.acquire().await;
    assert_eq!(limiter.remaining().await, 0);

    // The first admission leaves the window at t=10, the second at t=16.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(limiter.remaining().await, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_callers_never_exceed_budget() {
    let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(1)));
    let mut handles = Vec::new();
    for _ in 0..17 {
      let limiter = limiter.clone();
      handles.push(tokio::spawn(async move {
        limiter.acquire().await;
        Instant::now()
      }));
    }

    let mut admitted = Vec::new();
    for h in handles {
      admitted.push(h.await.unwrap());
    }
    admitted.sort();

    assert_eq!(admitted.len(), 17);
    for pair in admitted.windows(6) {
      assert!(pair[5].duration_since(pair[0]) >= Duration::from_secs(1));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_wait_claims_no_slot() {
    let limiter = RateLimiter::new(1, Duration::from_secs(10));
    limiter.acquire().await;

    let waited = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
    assert!(waited.is_err());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(limiter.remaining().await, 1);
  }
}
