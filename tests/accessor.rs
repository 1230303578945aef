use device_insight::metrics::{
    is_formatted_gb, BatteryState, BATTERY_LEVEL_UNAVAILABLE, DISK_SPACE_ERROR,
    DISK_SPACE_UNAVAILABLE,
};
use device_insight::monitor::collect_snapshot;
use device_insight::{MetricsSource, SystemAccessor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn is_one_decimal(value: f32) -> bool {
    ((value * 10.0).round() - value * 10.0).abs() < 1e-3
}

#[test]
fn battery_level_is_a_percent_or_sentinel() {
    let level = SystemAccessor::new().battery_level();
    assert!(
        (0..=100).contains(&level) || level == BATTERY_LEVEL_UNAVAILABLE,
        "unexpected battery level {level}"
    );
}

#[test]
fn battery_state_is_a_known_state() {
    let state = SystemAccessor::new().battery_state();
    assert!(matches!(
        state,
        BatteryState::Unknown | BatteryState::Unplugged | BatteryState::Charging | BatteryState::Full
    ));
}

#[test]
fn free_disk_space_has_a_defined_shape() {
    let space = SystemAccessor::new().free_disk_space();
    assert!(
        is_formatted_gb(&space) || space == DISK_SPACE_UNAVAILABLE || space == DISK_SPACE_ERROR,
        "unexpected disk space string {space:?}"
    );
}

#[test]
fn free_disk_space_follows_an_explicit_directory() {
    let dir = tempfile::tempdir().unwrap();
    let space = SystemAccessor::new()
        .with_data_dir(dir.path().join("not").join("created"))
        .free_disk_space();
    assert_ne!(space, DISK_SPACE_ERROR);
    assert!(is_formatted_gb(&space) || space == DISK_SPACE_UNAVAILABLE);
}

#[test]
fn identifiers_are_not_empty() {
    let mut accessor = SystemAccessor::new();
    assert!(!accessor.device_name().is_empty());
    assert!(!accessor.system_version().is_empty());
}

#[test]
fn memory_usage_is_rounded_and_non_negative() {
    let memory = SystemAccessor::new().memory_usage_mb();
    assert!(memory >= 0.0);
    assert!(is_one_decimal(memory), "{memory} has more than one decimal");
}

#[test]
fn cpu_usage_is_rounded_and_non_negative() {
    let mut accessor = SystemAccessor::new();
    let first = accessor.cpu_usage_percent();
    let mut acc = 0u64;
    for i in 0..2_000_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    std::hint::black_box(acc);
    let second = accessor.cpu_usage_percent();
    for usage in [first, second] {
        assert!(usage >= 0.0);
        assert!(is_one_decimal(usage), "{usage} has more than one decimal");
    }
}

#[test]
fn live_snapshot_is_fully_populated() {
    let snap = collect_snapshot(&mut SystemAccessor::new());
    assert!((0..=100).contains(&snap.battery_level) || snap.battery_level == -1);
    assert!(!snap.free_disk_space.is_empty());
    assert!(!snap.device_name.is_empty());
    assert!(!snap.system_version.is_empty());
    assert!(snap.memory_usage_mb >= 0.0);
    assert!(snap.cpu_usage_percent >= 0.0);
}

#[test]
fn busy_thread_shows_up_in_published_cpu_usage() {
    let running = Arc::new(AtomicBool::new(true));
    let spinner = {
        let running = running.clone();
        thread::spawn(move || {
            let mut acc = 0u64;
            while running.load(Ordering::Relaxed) {
                acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(1));
            }
        })
    };

    let mut accessor = SystemAccessor::new();
    let _ = collect_snapshot(&mut accessor);
    thread::sleep(Duration::from_millis(300));
    let snap = collect_snapshot(&mut accessor);

    running.store(false, Ordering::Relaxed);
    spinner.join().unwrap();

    assert!(
        snap.cpu_usage_percent > 0.0,
        "spinning thread not reflected: {}",
        snap.cpu_usage_percent
    );
    assert!(snap.memory_usage_mb > 0.0);
}

#[test]
fn battery_fields_come_from_one_read() {
    let snap = collect_snapshot(&mut SystemAccessor::new());
    if snap.battery_level == BATTERY_LEVEL_UNAVAILABLE {
        assert_eq!(snap.battery_state, BatteryState::Unknown);
    }
}
