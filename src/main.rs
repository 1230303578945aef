use clap::Parser;
use device_insight::config::{Config, Mode};
use device_insight::console::{ConsoleSubscriber, JsonSubscriber, LogSubscriber};
use device_insight::monitor::{MetricsMonitor, SnapshotSubscriber};
use device_insight::runtime;
use device_insight::SystemAccessor;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    runtime::init_tracing();
    let cfg = Config::parse();
    info!(
        "Starting device_insight: interval={}ms, mode={:?}, once={}",
        cfg.interval_ms, cfg.mode, cfg.once
    );

    let monitor = match MetricsMonitor::new(cfg.interval(), SystemAccessor::new()) {
        Ok(m) => m,
        Err(e) => {
            error!("Cannot create monitor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cfg.mode {
        Mode::Console => run(monitor, Arc::new(ConsoleSubscriber), cfg.once).await,
        Mode::Json => run(monitor, Arc::new(JsonSubscriber), cfg.once).await,
        Mode::Log => run(monitor, Arc::new(LogSubscriber), cfg.once).await,
    }
}

async fn run<T: SnapshotSubscriber + 'static>(
    mut monitor: MetricsMonitor<SystemAccessor>,
    subscriber: Arc<T>,
    once: bool,
) -> ExitCode {
    if once {
        let snapshot = monitor
            .sample_settled(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
            .await;
        subscriber.on_snapshot(snapshot);
        return ExitCode::SUCCESS;
    }

    // The monitor holds the subscriber weakly; `subscriber` keeps it alive.
    monitor.set_subscriber(&subscriber);
    if let Err(e) = monitor.start() {
        error!("Cannot start monitor: {}", e);
        return ExitCode::FAILURE;
    }

    runtime::shutdown_signal().await;
    monitor.stop();
    ExitCode::SUCCESS
}
