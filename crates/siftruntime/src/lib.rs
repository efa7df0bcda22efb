//! Incremental workflow execution runtime
//!
//! This crate turns a `siftcore` workflow graph into results: it computes a
//! deterministic execution order, fingerprints each node's effective inputs,
//! serves unchanged work from a two-tier cache, and runs the rest on a
//! bounded worker pool with failure containment.

pub mod cache;
mod engine;
mod executor;
pub mod fingerprint;
pub mod invalidate;
mod registry;
pub mod schedule;

pub use cache::{CacheConfig, CacheStats, CacheStore};
pub use engine::{Engine, EngineConfig};
pub use executor::{Coordinator, RunOptions};
pub use registry::NodeRegistry;
