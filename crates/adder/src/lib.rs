//! sumline-adder
//!
//! Producing side of the sumline pipeline: accepts sum requests, writes
//! the domain result and its event in one transaction (transactional
//! outbox), and relays outbox rows to the message log in the background.

pub mod api;
pub mod domain;
pub mod messaging;
pub mod persistence;
pub mod relay;
pub mod service;
