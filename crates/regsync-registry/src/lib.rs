//! Typed, rate-limited access to the external company registry.
//!
//! [`RegistryClient`] speaks the registry's JSON API over HTTP. Every call
//! first passes through a shared [`RateLimiter`]. Callers that only need the
//! behaviour depend on the [`Registry`] trait, which tests replace with
//! in-process fakes.

#![allow(async_fn_in_trait)]

pub mod client;
pub mod error;
pub mod limiter;
pub mod model;
pub mod registry;
pub mod risk;

mod wire;

pub use client::{RegistryClient, RegistryConfig};
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use registry::Registry;
