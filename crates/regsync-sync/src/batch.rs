//! Bulk search and detail requests with per-item failure isolation.
//!
//! Items run with bounded concurrency. Every item yields an outcome in
//! input order; a failing item never aborts its siblings. Dropping a running
//! batch cancels every item still in flight or waiting for a slot.

use std::{collections::HashMap, future::Future, sync::Arc};

use regsync_core::candidate::SourcePreference;
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
  ErrorKind, Result,
  merge::SearchResults,
  synchronizer::{DetailOptions, EntityDetails},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOperation {
  Search,
  Details,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
  /// Per-search result limit; the tier ceiling applies.
  pub limit:               Option<usize>,
  pub source:              SourcePreference,
  pub force_refresh:       bool,
  pub include_officers:    bool,
  pub include_controllers: bool,
}

impl BatchOptions {
  pub fn detail_options(&self) -> DetailOptions {
    DetailOptions {
      force_refresh:       self.force_refresh,
      include_officers:    self.include_officers,
      include_controllers: self.include_controllers,
      include_risk:        false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
  pub operation: BatchOperation,
  /// Search terms or entity identifiers, depending on `operation`.
  pub items:     Vec<String>,
  #[serde(default)]
  pub options:   BatchOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemData {
  Search(SearchResults),
  Details(Box<EntityDetails>),
}

impl From<SearchResults> for ItemData {
  fn from(r: SearchResults) -> Self { Self::Search(r) }
}

impl From<EntityDetails> for ItemData {
  fn from(d: EntityDetails) -> Self { Self::Details(Box::new(d)) }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
  Succeeded { data: ItemData },
  Failed { kind: ErrorKind, message: String },
}

impl ItemOutcome {
  pub fn is_success(&self) -> bool { matches!(self, Self::Succeeded { .. }) }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
  pub index:   usize,
  pub item:    String,
  #[serde(flatten)]
  pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
  pub total:     usize,
  pub succeeded: usize,
  pub failed:    usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
  Complete,
  PartialFailure,
  Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
  pub operation: BatchOperation,
  pub status:    BatchStatus,
  pub summary:   BatchSummary,
  pub results:   Vec<BatchItemResult>,
}

impl BatchReport {
  pub fn new(operation: BatchOperation, results: Vec<BatchItemResult>) -> Self {
    let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
    let summary = BatchSummary {
      total: results.len(),
      succeeded,
      failed: results.len() - succeeded,
    };
    let status = if summary.failed == 0 {
      BatchStatus::Complete
    } else if summary.succeeded == 0 {
      BatchStatus::Failed
    } else {
      BatchStatus::PartialFailure
    };
    Self { operation, status, summary, results }
  }
}

/// Run `run` over every item with at most `concurrency` in flight.
///
/// Each item is its own task in a [`JoinSet`], so a panic in one is reported
/// as that item's failure and dropping the returned future aborts the rest.
pub async fn run_bounded<T, F, Fut>(
  items: Vec<String>,
  concurrency: usize,
  run: F,
) -> Vec<BatchItemResult>
where
  T: Into<ItemData> + Send + 'static,
  F: Fn(String) -> Fut,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  let permits = Arc::new(Semaphore::new(concurrency.max(1)));
  let mut tasks = JoinSet::new();
  let mut slots = HashMap::with_capacity(items.len());

  for (index, item) in items.iter().enumerate() {
    let fut = run(item.clone());
    let permits = Arc::clone(&permits);
    let handle = tasks.spawn(async move {
      let _permit = permits.acquire_owned().await;
      fut.await
    });
    slots.insert(handle.id(), index);
  }

  let mut outcomes: Vec<Option<ItemOutcome>> = items.iter().map(|_| None).collect();
  while let Some(joined) = tasks.join_next_with_id().await {
    let (id, result) = match joined {
      Ok((id, result)) => (id, Ok(result)),
      Err(join) => (join.id(), Err(join)),
    };
    let Some(&index) = slots.get(&id) else { continue };
    let item = &items[index];

    outcomes[index] = Some(match result {
      Ok(Ok(data)) => ItemOutcome::Succeeded { data: data.into() },
      Ok(Err(e)) => {
        tracing::debug!(index, %item, error = %e, "batch item failed");
        ItemOutcome::Failed {
          kind:    e.kind(),
          message: e.to_string(),
        }
      }
      Err(join) => {
        tracing::error!(index, %item, error = %join, "batch item task aborted");
        ItemOutcome::Failed {
          kind:    ErrorKind::Store,
          message: "item aborted unexpectedly".into(),
        }
      }
    });
  }

  items
    .into_iter()
    .zip(outcomes)
    .enumerate()
    .map(|(index, (item, outcome))| BatchItemResult {
      index,
      item,
      outcome: outcome.unwrap_or_else(|| ItemOutcome::Failed {
        kind:    ErrorKind::Store,
        message: "item produced no outcome".into(),
      }),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;
  use crate::Error;

  fn search_results(term: &str) -> SearchResults {
    SearchResults {
      term:           term.into(),
      source:         SourcePreference::Local,
      limit:          1,
      candidates:     Vec::new(),
      registry_error: None,
    }
  }

  #[tokio::test]
  async fn failures_are_isolated_and_ordered() {
    let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let results = run_bounded(items, 2, |item| async move {
      if item == "b" {
        Err(Error::Upstream {
          status:  Some(500),
          message: "boom".into(),
        })
      } else {
        Ok(search_results(&item))
      }
    })
    .await;

    assert_eq!(
      results.iter().map(|r| r.item.as_str()).collect::<Vec<_>>(),
      ["a", "b", "c"]
    );
    let report = BatchReport::new(BatchOperation::Search, results);
    assert_eq!(report.status, BatchStatus::PartialFailure);
    assert_eq!(report.summary, BatchSummary { total: 3, succeeded: 2, failed: 1 });
    match &report.results[1].outcome {
      ItemOutcome::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Upstream),
      other => panic!("expected failure, got {other:?}"),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn concurrency_is_bounded() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let items: Vec<String> = (0..10).map(|i| i.to_string()).collect();

    let results = run_bounded(items, 3, |item| {
      let in_flight = Arc::clone(&in_flight);
      let peak = Arc::clone(&peak);
      async move {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(search_results(&item))
      }
    })
    .await;

    assert_eq!(results.len(), 10);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(BatchReport::new(BatchOperation::Search, results).status, BatchStatus::Complete);
  }

  #[tokio::test]
  async fn panicking_item_fails_alone() {
    let items = vec!["a".to_string(), "b".to_string()];
    let results = run_bounded(items, 2, |item| async move {
      if item == "a" {
        panic!("item blew up");
      }
      Ok(search_results(&item))
    })
    .await;

    assert_eq!(results[0].item, "a");
    assert!(matches!(results[0].outcome, ItemOutcome::Failed { kind: ErrorKind::Store, .. }));
    assert!(results[1].outcome.is_success());
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_batch_cancels_pending_items() {
    let started = Arc::new(AtomicUsize::new(0));
    let items: Vec<String> = (0..5).map(|i| i.to_string()).collect();

    let batch = run_bounded(items, 1, |item| {
      let started = Arc::clone(&started);
      async move {
        started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(search_results(&item))
      }
    });
    assert!(tokio::time::timeout(Duration::from_millis(50), batch).await.is_err());
    assert_eq!(started.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn all_failed_is_failed() {
    let results = vec![BatchItemResult {
      index:   0,
      item:    "x".into(),
      outcome: ItemOutcome::Failed {
        kind:    ErrorKind::NotFound,
        message: "entity not found: x".into(),
      },
    }];
    assert_eq!(BatchReport::new(BatchOperation::Details, results).status, BatchStatus::Failed);
  }
}
