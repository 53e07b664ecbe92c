//! sumline-totalizer
//!
//! Consuming side of the sumline pipeline: reads events from the
//! message log, applies each one exactly once to the running total
//! (dedup record and apply share a transaction), and serves the
//! current total over HTTP.

pub mod api;
pub mod consumer;
pub mod domain;
pub mod persistence;
pub mod service;
pub mod sweeper;
