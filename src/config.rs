use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Redraw a labelled panel in the terminal
    Console,
    /// One JSON object per line on stdout
    Json,
    /// Structured log events only
    Log,
}

#[derive(Clone, Debug, Parser)]
#[command(
    name = "device_insight",
    about = "Periodically samples battery, disk, memory and CPU metrics"
)]
pub struct Config {
    /// Sampling interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub interval_ms: u64,

    /// Output mode (console/json/log)
    #[arg(long, value_enum, default_value_t = Mode::Console)]
    pub mode: Mode,

    /// Take a single sample, print it and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
