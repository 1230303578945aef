use crate::error::AccessError;
use crate::metrics::{
    bytes_to_mb, format_gb, round_to_tenth, BatteryState, MetricsSnapshot,
    BATTERY_LEVEL_UNAVAILABLE, DISK_SPACE_ERROR, DISK_SPACE_UNAVAILABLE,
};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// One query per metric. Implementations turn every OS failure into the
/// metric's fallback value instead of returning an error.
pub trait MetricsSource: Send {
    fn battery_level(&mut self) -> i32;
    fn battery_state(&mut self) -> BatteryState;
    fn free_disk_space(&mut self) -> String;
    fn device_name(&mut self) -> String;
    fn system_version(&mut self) -> String;
    fn memory_usage_mb(&mut self) -> f32;
    fn cpu_usage_percent(&mut self) -> f32;

    /// Reads all seven metrics for one tick. Sources whose queries share an
    /// OS read override this to perform that read once.
    fn snapshot(&mut self) -> MetricsSnapshot {
        MetricsSnapshot {
            battery_level: self.battery_level(),
            battery_state: self.battery_state(),
            free_disk_space: self.free_disk_space(),
            device_name: self.device_name(),
            system_version: self.system_version(),
            memory_usage_mb: self.memory_usage_mb(),
            cpu_usage_percent: self.cpu_usage_percent(),
        }
    }
}

/// Per-thread reading used by [`aggregate_thread_usage`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThreadSample {
    pub idle: bool,
    /// `None` when the thread's info could not be read.
    pub usage_percent: Option<f32>,
}

/// Sums usage over non-idle threads and rounds to one decimal.
/// Unreadable threads contribute nothing.
pub fn aggregate_thread_usage(threads: &[ThreadSample]) -> f32 {
    let total: f32 = threads
        .iter()
        .filter(|t| !t.idle)
        .filter_map(|t| t.usage_percent)
        .map(|u| u.max(0.0))
        .sum();
    round_to_tenth(total)
}

/// Available bytes on the mount that contains `path`: the longest mount
/// point that is a prefix of it.
pub fn volume_for_path<'a, I>(path: &Path, mounts: I) -> Option<u64>
where
    I: IntoIterator<Item = (&'a Path, u64)>,
{
    mounts
        .into_iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, available)| available)
}

/// Level and state taken from one battery read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryReading {
    pub level: i32,
    pub state: BatteryState,
}

impl BatteryReading {
    pub const UNAVAILABLE: BatteryReading = BatteryReading {
        level: BATTERY_LEVEL_UNAVAILABLE,
        state: BatteryState::Unknown,
    };

    /// `charge` is the state of charge as a ratio in `0.0..=1.0`.
    pub fn new(charge: f32, state: battery::State) -> Self {
        Self {
            level: (charge * 100.0).round().clamp(0.0, 100.0) as i32,
            state: map_battery_state(state),
        }
    }
}

/// Memory and CPU of the current process from one refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ProcessReading {
    memory_mb: f32,
    cpu_percent: f32,
}

pub fn map_battery_state(state: battery::State) -> BatteryState {
    match state {
        battery::State::Charging => BatteryState::Charging,
        battery::State::Full => BatteryState::Full,
        battery::State::Discharging | battery::State::Empty => BatteryState::Unplugged,
        _ => BatteryState::Unknown,
    }
}

/// Reads metrics from the running host through `sysinfo` and `battery`.
///
/// The `System` handle is kept between calls because per-thread CPU usage is
/// computed from the delta between two refreshes; the first CPU reading after
/// construction is therefore `0.0`.
pub struct SystemAccessor {
    sys: System,
    pid: Option<Pid>,
    data_dir: Option<PathBuf>,
    battery_missing_logged: bool,
}

impl Default for SystemAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAccessor {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                warn!("Cannot resolve current pid, process metrics disabled: {}", err);
                None
            }
        };
        Self {
            sys: System::new(),
            pid,
            data_dir: None,
            battery_missing_logged: false,
        }
    }

    /// Measures free space on the volume holding `dir` instead of the
    /// platform data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    fn read_battery(&mut self) -> BatteryReading {
        match open_first_battery() {
            Ok(battery) => BatteryReading::new(battery.state_of_charge().value, battery.state()),
            Err(err) => {
                if self.battery_missing_logged {
                    debug!("Battery unavailable: {}", err);
                } else {
                    warn!("Battery unavailable, reporting sentinel values: {}", err);
                    self.battery_missing_logged = true;
                }
                BatteryReading::UNAVAILABLE
            }
        }
    }

    fn resolve_data_volume(&self) -> Result<PathBuf, AccessError> {
        let dir = self
            .data_dir
            .clone()
            .or_else(dirs::data_dir)
            .or_else(dirs::home_dir)
            .or_else(|| std::env::current_dir().ok())
            .ok_or(AccessError::DataDirUnavailable)?;
        // The data dir may not exist yet; its nearest existing ancestor sits
        // on the same volume.
        let existing = dir
            .ancestors()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
            .ok_or(AccessError::DataDirUnavailable)?;
        Ok(existing.canonicalize()?)
    }

    /// Refreshes memory, CPU and threads of this process in a single call.
    /// Any refresh of the process restarts sysinfo's CPU measurement window,
    /// so memory and CPU must come from the same one.
    fn read_process(&mut self) -> ProcessReading {
        let Some(pid) = self.pid else {
            return ProcessReading::default();
        };
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_cpu()
                .with_tasks(),
        );
        let Some(process) = self.sys.process(pid) else {
            warn!("Process {} not found, reporting 0 MB and 0% CPU", pid);
            return ProcessReading::default();
        };
        let memory_mb = bytes_to_mb(process.memory());
        let process_sample = ThreadSample {
            idle: process.status() == ProcessStatus::Idle,
            usage_percent: Some(process.cpu_usage()),
        };

        let thread_ids: Vec<Pid> = match process.tasks() {
            Some(tasks) => tasks.iter().copied().filter(|tid| *tid != pid).collect(),
            None => Vec::new(),
        };
        if thread_ids.is_empty() {
            // No per-thread data on this platform: the process is one thread.
            return ProcessReading {
                memory_mb,
                cpu_percent: aggregate_thread_usage(&[process_sample]),
            };
        }

        let mut threads: Vec<ThreadSample> = thread_ids
            .iter()
            .map(|tid| match self.sys.process(*tid) {
                Some(task) => ThreadSample {
                    idle: task.status() == ProcessStatus::Idle,
                    usage_percent: Some(task.cpu_usage()),
                },
                None => ThreadSample {
                    idle: false,
                    usage_percent: None,
                },
            })
            .collect();

        // The leader's entry carries whole-process totals, so its own share
        // is whatever the other threads do not account for.
        let others: f32 = threads.iter().filter_map(|t| t.usage_percent).sum();
        threads.push(ThreadSample {
            idle: process_sample.idle,
            usage_percent: process_sample
                .usage_percent
                .map(|total| (total - others).max(0.0)),
        });

        let cpu_percent = aggregate_thread_usage(&threads);
        debug!(threads = threads.len(), cpu_percent, memory_mb, "Sampled process");
        ProcessReading {
            memory_mb,
            cpu_percent,
        }
    }
}

fn open_first_battery() -> Result<battery::Battery, AccessError> {
    let manager = battery::Manager::new()?;
    let mut batteries = manager.batteries()?;
    match batteries.next() {
        Some(battery) => Ok(battery?),
        None => Err(AccessError::NoBattery),
    }
}

impl MetricsSource for SystemAccessor {
    fn battery_level(&mut self) -> i32 {
        self.read_battery().level
    }

    fn battery_state(&mut self) -> BatteryState {
        self.read_battery().state
    }

    fn free_disk_space(&mut self) -> String {
        let volume = match self.resolve_data_volume() {
            Ok(path) => path,
            Err(err) => {
                warn!("Disk space query failed: {}", err);
                return DISK_SPACE_ERROR.to_string();
            }
        };
        let disks = Disks::new_with_refreshed_list();
        let available = volume_for_path(
            &volume,
            disks
                .list()
                .iter()
                .map(|d| (d.mount_point(), d.available_space())),
        );
        match available {
            Some(bytes) => format_gb(bytes),
            None => {
                debug!("No mounted disk contains {}", volume.display());
                DISK_SPACE_UNAVAILABLE.to_string()
            }
        }
    }

    fn device_name(&mut self) -> String {
        System::host_name()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    fn system_version(&mut self) -> String {
        System::long_os_version()
            .or_else(System::os_version)
            .or_else(System::kernel_version)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn memory_usage_mb(&mut self) -> f32 {
        self.read_process().memory_mb
    }

    fn cpu_usage_percent(&mut self) -> f32 {
        self.read_process().cpu_percent
    }

    /// One battery read and one process refresh per tick.
    fn snapshot(&mut self) -> MetricsSnapshot {
        let battery = self.read_battery();
        let process = self.read_process();
        MetricsSnapshot {
            battery_level: battery.level,
            battery_state: battery.state,
            free_disk_space: self.free_disk_space(),
            device_name: self.device_name(),
            system_version: self.system_version(),
            memory_usage_mb: process.memory_mb,
            cpu_usage_percent: process.cpu_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy(usage: f32) -> ThreadSample {
        ThreadSample {
            idle: false,
            usage_percent: Some(usage),
        }
    }

    #[test]
    fn sums_non_idle_threads() {
        let threads = [busy(12.5), busy(30.04), busy(0.0)];
        assert_eq!(aggregate_thread_usage(&threads), 42.5);
    }

    #[test]
    fn skips_idle_threads() {
        let threads = [
            busy(10.0),
            ThreadSample {
                idle: true,
                usage_percent: Some(50.0),
            },
        ];
        assert_eq!(aggregate_thread_usage(&threads), 10.0);
    }

    #[test]
    fn idle_only_reports_zero() {
        let idle = ThreadSample {
            idle: true,
            usage_percent: Some(3.0),
        };
        assert_eq!(aggregate_thread_usage(&[idle, idle]), 0.0);
        assert_eq!(aggregate_thread_usage(&[]), 0.0);
    }

    #[test]
    fn unreadable_thread_contributes_nothing() {
        let threads = [
            busy(5.0),
            ThreadSample {
                idle: false,
                usage_percent: None,
            },
        ];
        assert_eq!(aggregate_thread_usage(&threads), 5.0);
    }

    #[test]
    fn multi_core_usage_can_exceed_hundred() {
        let threads = [busy(98.0), busy(97.5), busy(60.0)];
        assert_eq!(aggregate_thread_usage(&threads), 255.5);
    }

    #[test]
    fn picks_longest_matching_mount() {
        let mounts = [
            (Path::new("/"), 100),
            (Path::new("/home"), 200),
            (Path::new("/home/user/data"), 300),
            (Path::new("/mnt"), 400),
        ];
        assert_eq!(
            volume_for_path(Path::new("/home/other/.local"), mounts),
            Some(200)
        );
        assert_eq!(
            volume_for_path(Path::new("/home/user/data/app"), mounts),
            Some(300)
        );
        assert_eq!(volume_for_path(Path::new("/var/lib"), mounts), Some(100));
    }

    #[test]
    fn mount_prefix_matches_whole_components() {
        let mounts = [(Path::new("/home"), 1)];
        assert_eq!(volume_for_path(Path::new("/homework"), mounts), None);
    }

    #[test]
    fn no_mounts_means_no_value() {
        let mounts: [(&Path, u64); 0] = [];
        assert_eq!(volume_for_path(Path::new("/data"), mounts), None);
    }

    #[test]
    fn battery_reading_scales_and_clamps_charge() {
        let reading = BatteryReading::new(0.874, battery::State::Discharging);
        assert_eq!(reading.level, 87);
        assert_eq!(reading.state, BatteryState::Unplugged);
        assert_eq!(BatteryReading::new(1.02, battery::State::Full).level, 100);
        assert_eq!(BatteryReading::new(-0.1, battery::State::Unknown).level, 0);
        assert_eq!(BatteryReading::UNAVAILABLE.level, BATTERY_LEVEL_UNAVAILABLE);
        assert_eq!(BatteryReading::UNAVAILABLE.state, BatteryState::Unknown);
    }

    #[test]
    fn maps_platform_battery_states() {
        assert_eq!(
            map_battery_state(battery::State::Charging),
            BatteryState::Charging
        );
        assert_eq!(map_battery_state(battery::State::Full), BatteryState::Full);
        assert_eq!(
            map_battery_state(battery::State::Discharging),
            BatteryState::Unplugged
        );
        assert_eq!(
            map_battery_state(battery::State::Empty),
            BatteryState::Unplugged
        );
        assert_eq!(
            map_battery_state(battery::State::Unknown),
            BatteryState::Unknown
        );
    }
}
