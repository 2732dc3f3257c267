//! Customer/order KPI batch pipeline.
//!
//! Normalizer → Deduplicator → KPI Engine → Result Sink, one pass per run,
//! over a pluggable storage backend.

pub mod backend;
pub mod config;
pub mod dedup;
pub mod error;
pub mod kpi;
pub mod memory;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod store;
pub mod types;
