use serde::{Deserialize, Serialize};
use std::fmt;

/// Reported as `battery_level` when the platform has no battery or cannot read it.
pub const BATTERY_LEVEL_UNAVAILABLE: i32 = -1;

/// Reported as `free_disk_space` when the OS has no value for the data volume.
pub const DISK_SPACE_UNAVAILABLE: &str = "N/A";

/// Reported as `free_disk_space` when the disk query itself failed.
pub const DISK_SPACE_ERROR: &str = "Error retrieving disk space";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatteryState {
    Unknown,
    Unplugged,
    Charging,
    Full,
}

impl BatteryState {
    pub fn as_str(self) -> &'static str {
        match self {
            BatteryState::Unknown => "Unknown",
            BatteryState::Unplugged => "Unplugged",
            BatteryState::Charging => "Charging",
            BatteryState::Full => "Full",
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tick's worth of metrics. Every field is filled from the same sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Percent in `0..=100`, or [`BATTERY_LEVEL_UNAVAILABLE`].
    pub battery_level: i32,
    pub battery_state: BatteryState,
    /// `"X.XX GB"`, [`DISK_SPACE_UNAVAILABLE`] or [`DISK_SPACE_ERROR`].
    pub free_disk_space: String,
    pub device_name: String,
    pub system_version: String,
    /// Resident size of this process in MB, one decimal.
    pub memory_usage_mb: f32,
    /// Sum over non-idle threads of this process, one decimal. Can exceed 100.
    pub cpu_usage_percent: f32,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Battery Level  : {}%", self.battery_level)?;
        writeln!(f, "Battery State  : {}", self.battery_state)?;
        writeln!(f, "Free Disk Space: {}", self.free_disk_space)?;
        writeln!(f, "Memory Usage   : {:.1}MB", self.memory_usage_mb)?;
        writeln!(f, "CPU Usage      : {:.1}%", self.cpu_usage_percent)?;
        writeln!(f, "Device Name    : {}", self.device_name)?;
        write!(f, "System Version : {}", self.system_version)
    }
}

/// Rounds half away from zero to one decimal place.
pub fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

pub fn bytes_to_mb(bytes: u64) -> f32 {
    round_to_tenth((bytes as f64 / BYTES_PER_MB) as f32)
}

pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / BYTES_PER_GB)
}

/// True when `s` has the shape produced by [`format_gb`].
pub fn is_formatted_gb(s: &str) -> bool {
    let Some(number) = s.strip_suffix(" GB") else {
        return false;
    };
    match number.split_once('.') {
        Some((whole, frac)) => {
            !whole.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && frac.len() == 2
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
