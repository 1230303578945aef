use crate::metrics::MetricsSnapshot;
use crate::monitor::SnapshotSubscriber;
use crossterm::cursor::MoveTo;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{stdout, Write};
use tracing::{error, info};

/// Redraws the latest snapshot as a labelled panel.
#[derive(Default)]
pub struct ConsoleSubscriber;

impl SnapshotSubscriber for ConsoleSubscriber {
    fn on_snapshot(&self, snapshot: MetricsSnapshot) {
        let mut out = stdout().lock();
        if let Err(e) = render_once(&mut out, &snapshot) {
            error!("Console render error: {}", e);
        }
    }
}

/// Prints each snapshot as one JSON line.
#[derive(Default)]
pub struct JsonSubscriber;

impl SnapshotSubscriber for JsonSubscriber {
    fn on_snapshot(&self, snapshot: MetricsSnapshot) {
        match serde_json::to_string(&snapshot) {
            Ok(line) => {
                let mut out = stdout().lock();
                if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
                    error!("Failed to write snapshot: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize snapshot: {}", e),
        }
    }
}

/// Emits each snapshot as a structured log event.
#[derive(Default)]
pub struct LogSubscriber;

impl SnapshotSubscriber for LogSubscriber {
    fn on_snapshot(&self, snapshot: MetricsSnapshot) {
        info!(
            battery_level = snapshot.battery_level,
            battery_state = %snapshot.battery_state,
            free_disk_space = %snapshot.free_disk_space,
            memory_usage_mb = snapshot.memory_usage_mb,
            cpu_usage_percent = snapshot.cpu_usage_percent,
            device_name = %snapshot.device_name,
            system_version = %snapshot.system_version,
            "Metrics snapshot"
        );
    }
}

pub fn render_once<W: Write>(out: &mut W, snap: &MetricsSnapshot) -> std::io::Result<()> {
    out.queue(MoveTo(0, 0))?;
    out.queue(Clear(ClearType::All))?;

    writeln!(out, "Device Insight (console)")?;
    writeln!(
        out,
        "Updated {}. Press Ctrl+C to exit.",
        chrono::Local::now().format("%H:%M:%S")
    )?;
    writeln!(out)?;

    writeln!(out, "Battery Level  : {}", battery_level_text(snap.battery_level))?;
    writeln!(out, "Battery State  : {}", snap.battery_state)?;
    writeln!(out, "Free Disk Space: {}", snap.free_disk_space)?;
    writeln!(
        out,
        "Memory Usage   : {}",
        color_value(snap.memory_usage_mb, "MB", 512.0, 1024.0)
    )?;
    writeln!(
        out,
        "CPU Usage      : {}",
        color_value(snap.cpu_usage_percent, "%", 50.0, 80.0)
    )?;
    writeln!(out, "Device Name    : {}", snap.device_name)?;
    writeln!(out, "System Version : {}", snap.system_version)?;

    out.flush()
}

fn battery_level_text(level: i32) -> String {
    if level < 0 {
        "N/A".to_string()
    } else {
        format!("{level}%")
    }
}

fn color_value(value: f32, unit: &str, warn: f32, crit: f32) -> String {
    let s = format!("{value:.1}{unit}");
    if value >= crit {
        s.with(Color::Red).to_string()
    } else if value >= warn {
        s.with(Color::Yellow).to_string()
    } else {
        s.with(Color::Green).to_string()
    }
}
