pub mod config;
pub mod error;
pub mod intake;
pub mod middleware;
pub mod telemetry;
