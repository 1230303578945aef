use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("sampling interval must be positive, got {0:?}")]
    InvalidInterval(Duration),
    #[error("no tokio runtime available to drive the sampling schedule")]
    NoRuntime,
}

/// Failures inside a single metric query. These never leave the accessor;
/// each one is turned into that metric's fallback value.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no data directory could be resolved for this process")]
    DataDirUnavailable,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("battery query failed: {0}")]
    Battery(#[from] battery::Error),
    #[error("no battery present")]
    NoBattery,
}
