pub mod config;
pub mod db;
pub mod shutdown;
pub mod telemetry;

pub use config::*;
pub use shutdown::*;
