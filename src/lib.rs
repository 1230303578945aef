//! Periodic sampling of host battery, disk, memory and CPU metrics.

pub mod accessor;
pub mod config;
pub mod console;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod runtime;

pub use accessor::{MetricsSource, SystemAccessor};
pub use error::MonitorError;
pub use metrics::{BatteryState, MetricsSnapshot};
pub use monitor::{MetricsMonitor, SnapshotSubscriber};
