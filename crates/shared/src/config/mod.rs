//! Configuration module for the sumline services
//!
//! This module provides centralized configuration loading, validation, and
//! Data Transfer Objects (DTOs) for both services of the pipeline.
//!
//! # Architecture
//!
//! The configuration system follows these principles:
//!
//! 1. **Single Source of Truth**: All configuration is loaded once at startup
//! 2. **Fail Fast**: Errors are reported immediately, no silent fallbacks
//! 3. **DTO Pattern**: Configuration is immutable and passed via dependency injection
//! 4. **Env File Priority**: `.env` file > environment variables > default
//!
//! # Usage
//!
//! ```ignore
//! use sumline_shared::config::ConfigLoader;
//! use std::path::PathBuf;
//!
//! let loader = ConfigLoader::new(Some(PathBuf::from(".env")));
//! let config = loader.load_adder_config()?;
//!
//! println!("HTTP server binds to: {}", config.http.bind_address);
//! ```
//!
//! # Environment Variables
//!
//! ## Required Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string for the owning service
//!
//! ## Optional Variables
//!
//! - `HTTP_BIND`: HTTP bind address (defaults per service)
//! - `NATS_URL`: NATS connection URL (default: "nats://localhost:4222")
//! - `RELAY_INTERVAL_MS`, `RELAY_BATCH`, `RELAY_MAX_RETRIES`: relay tuning
//! - `OUTBOX_RETENTION_SECS`, `OUTBOX_CLEANUP_INTERVAL_SECS`: outbox GC
//! - `CONSUMER_GROUP`: durable consumer name (default: "totalizer-group")
//! - `RUST_LOG`: log level (default: "info")

pub mod dto;
pub mod error;
pub mod loader;

pub use dto::{
    AdderConfig, ConsumerSettings, DatabaseConfig, HttpConfig, LoggingConfig, NatsConfig,
    RelaySettings, TotalizerConfig,
};
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
