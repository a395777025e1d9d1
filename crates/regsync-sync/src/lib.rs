//! The registry synchronisation engine.
//!
//! Decides per request whether the cache can answer, fetches from the
//! registry when it cannot, and writes what it fetched back. Searches merge
//! both sources; batches fan requests out with per-item isolation; every
//! caller-facing operation passes the tier quota first.
//!
//! [`SyncService`] is the entry point used by the HTTP layer.

#![allow(async_fn_in_trait)]

pub mod batch;
pub mod error;
pub mod merge;
pub mod quota;
pub mod service;
pub mod synchronizer;
pub mod writeback;

pub use error::{Error, ErrorKind, Result};
pub use quota::{Caller, QuotaGate, QuotaStatus};
pub use service::{SyncConfig, SyncService};
pub use synchronizer::{DetailOptions, EntityDetails, Origin, Synchronizer};
