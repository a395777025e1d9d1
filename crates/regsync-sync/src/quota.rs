//! Per-caller daily request ceilings.
//!
//! The day is the UTC calendar day. Admission is counted and logged by the
//! store in one step, so two concurrent requests cannot both take the last
//! slot.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use regsync_core::{
  store::{Admission, CacheStore},
  tier::Tier,
};
use serde::Serialize;

use crate::{Error, Result, error::QuotaScope};

const MAX_CALLER_ID_LEN: usize = 128;

/// The identity and tier resolved by the auth/billing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub id:   String,
  pub tier: Tier,
}

impl Caller {
  pub fn new(id: impl Into<String>, tier: Tier) -> Result<Self> {
    let id = id.into().trim().to_owned();
    if id.is_empty() || id.len() > MAX_CALLER_ID_LEN {
      return Err(Error::Validation(format!(
        "caller id must be 1 to {MAX_CALLER_ID_LEN} bytes"
      )));
    }
    Ok(Self { id, tier })
  }
}

/// Midnight UTC at the start of `now`'s day.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
  now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// The instant the daily counter next resets.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> { day_start(now) + Duration::days(1) }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
  pub caller_id:   String,
  pub tier:        Tier,
  pub used:        u32,
  /// `None` when the tier is unlimited.
  pub daily_limit: Option<u32>,
  pub remaining:   Option<u32>,
  pub max_results: usize,
  pub max_batch:   Option<usize>,
  pub resets_at:   DateTime<Utc>,
}

impl QuotaStatus {
  fn new(caller: &Caller, used: u32, now: DateTime<Utc>) -> Self {
    let limits = caller.tier.limits();
    Self {
      caller_id: caller.id.clone(),
      tier: caller.tier,
      used,
      daily_limit: limits.daily_requests,
      remaining: limits.daily_requests.map(|cap| cap.saturating_sub(used)),
      max_results: limits.max_results,
      max_batch: limits.max_batch,
      resets_at: next_reset(now),
    }
  }
}

pub struct QuotaGate<S> {
  store: Arc<S>,
}

impl<S> Clone for QuotaGate<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: CacheStore> QuotaGate<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Count this request against the caller's day, or refuse it.
  pub async fn admit(&self, caller: &Caller) -> Result<QuotaStatus> {
    self.admit_at(caller, Utc::now()).await
  }

  pub async fn admit_at(&self, caller: &Caller, now: DateTime<Utc>) -> Result<QuotaStatus> {
    let ceiling = caller.tier.limits().daily_requests;
    let admission = self
      .store
      .admit_request(&caller.id, now, day_start(now), ceiling)
      .await
      .map_err(Error::store)?;

    match admission {
      Admission::Admitted { used } => {
        tracing::debug!(caller = %caller.id, tier = %caller.tier, used, "request admitted");
        Ok(QuotaStatus::new(caller, used, now))
      }
      Admission::Denied { used } => {
        tracing::info!(caller = %caller.id, tier = %caller.tier, used, "daily quota exhausted");
        Err(Error::QuotaExceeded {
          tier: caller.tier,
          scope: QuotaScope::DailyRequests,
          used,
          ceiling: ceiling.unwrap_or(used),
        })
      }
    }
  }

  /// Current usage without consuming anything.
  pub async fn status(&self, caller: &Caller) -> Result<QuotaStatus> {
    self.status_at(caller, Utc::now()).await
  }

  pub async fn status_at(&self, caller: &Caller, now: DateTime<Utc>) -> Result<QuotaStatus> {
    let used = self
      .store
      .count_requests(&caller.id, day_start(now))
      .await
      .map_err(Error::store)?;
    Ok(QuotaStatus::new(caller, used, now))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use regsync_store_sqlite::SqliteStore;

  use super::*;
  use crate::ErrorKind;

  async fn gate() -> QuotaGate<SqliteStore> {
    QuotaGate::new(Arc::new(SqliteStore::open_in_memory().await.unwrap()))
  }

  #[test]
  fn day_boundaries_are_utc_midnight() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
    assert_eq!(day_start(now), Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    assert_eq!(next_reset(now), Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
  }

  #[test]
  fn caller_id_is_validated() {
    assert!(Caller::new("  ", Tier::Free).is_err());
    assert!(Caller::new("x".repeat(MAX_CALLER_ID_LEN + 1), Tier::Free).is_err());
    assert_eq!(Caller::new(" acct-1 ", Tier::Free).unwrap().id, "acct-1");
  }

  #[tokio::test]
  async fn free_tier_gets_five_per_day_then_resets() {
    let gate = gate().await;
    let caller = Caller::new("acct-1", Tier::Free).unwrap();
    let morning = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

    for n in 1..=5 {
      let status = gate.admit_at(&caller, morning).await.unwrap();
      assert_eq!(status.used, n);
      assert_eq!(status.remaining, Some(5 - n));
    }

    let err = gate.admit_at(&caller, morning).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    match err {
      Error::QuotaExceeded { tier, used, ceiling, scope } => {
        assert_eq!(tier, Tier::Free);
        assert_eq!((used, ceiling), (5, 5));
        assert_eq!(scope, QuotaScope::DailyRequests);
      }
      other => panic!("unexpected error: {other}"),
    }

    let tomorrow = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 1).unwrap();
    assert_eq!(gate.status_at(&caller, tomorrow).await.unwrap().used, 0);
    assert_eq!(gate.admit_at(&caller, tomorrow).await.unwrap().used, 1);
  }

  #[tokio::test]
  async fn enterprise_is_unlimited() {
    let gate = gate().await;
    let caller = Caller::new("big-co", Tier::Enterprise).unwrap();
    for _ in 0..20 {
      gate.admit(&caller).await.unwrap();
    }
    let status = gate.status(&caller).await.unwrap();
    assert_eq!(status.used, 20);
    assert_eq!(status.remaining, None);
  }

  #[tokio::test]
  async fn concurrent_admissions_never_overshoot() {
    let gate = gate().await;
    let caller = Caller::new("racer", Tier::Free).unwrap();
    let mut handles = Vec::new();
    for _ in 0..12 {
      let gate = gate.clone();
      let caller = caller.clone();
      handles.push(tokio::spawn(async move { gate.admit(&caller).await.is_ok() }));
    }
    let mut admitted = 0;
    for h in handles {
      if h.await.unwrap() {
        admitted += 1;
      }
    }
    assert_eq!(admitted, 5);
  }
}
