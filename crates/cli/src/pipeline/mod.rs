//! Monitor orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Monitor, MonitorConfig};
pub use stats::RunStats;
