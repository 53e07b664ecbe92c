//! PostgreSQL persistence for the producing side.

pub mod outbox;

pub use outbox::PostgresOutboxRepository;
