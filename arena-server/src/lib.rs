//! Petal Arena Server Library
//!
//! Everything around the simulation core that a running server needs:
//! - Length-prefixed bincode wire codec
//! - TCP transport with one read and one write task per connection
//! - Instance runners, one OS thread and current-thread runtime per world
//! - Supervisor status table and least-loaded connection handoff
//! - Lock-free server metrics with Prometheus + JSON export
//! - HTTP status API (axum)
//! - RON configuration with `ARENA_*` environment overrides

pub mod api;
pub mod config;
pub mod instance;
pub mod metrics;
pub mod protocol;
pub mod supervisor;
pub mod transport;

pub use config::ServerConfig;
pub use instance::{Instance, InstanceEvent, InstanceHandle};
pub use metrics::ServerMetrics;
pub use supervisor::{InstanceReport, StatusTable, Supervisor};
