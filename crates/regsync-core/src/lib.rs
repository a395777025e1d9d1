//! Core types and trait definitions for the registry synchronisation engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store, registry and sync crates all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod appointment;
pub mod candidate;
pub mod entity;
pub mod error;
pub mod person;
pub mod relationship;
pub mod risk;
pub mod store;
pub mod tier;

pub use error::{Error, Result};
