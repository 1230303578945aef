use crate::accessor::MetricsSource;
use crate::error::MonitorError;
use crate::metrics::MetricsSnapshot;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Receives every snapshot the monitor publishes.
///
/// Called synchronously from the sampling task; implementations that need a
/// particular thread (a UI loop, say) must hop there themselves.
pub trait SnapshotSubscriber: Send + Sync {
    fn on_snapshot(&self, snapshot: MetricsSnapshot);
}

type SubscriberSlot = Arc<RwLock<Option<Weak<dyn SnapshotSubscriber>>>>;

enum MonitorState {
    Idle,
    Running {
        interval: Duration,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
}

/// Samples a [`MetricsSource`] on a repeating schedule and hands each
/// snapshot to a single weakly-held subscriber.
///
/// The schedule runs as one task on the tokio runtime captured at
/// construction. `start` only spawns onto that runtime, so it never blocks
/// and may be called from threads outside it.
pub struct MetricsMonitor<S: MetricsSource + 'static> {
    interval: Duration,
    source: Arc<Mutex<S>>,
    subscriber: SubscriberSlot,
    runtime: Handle,
    state: MonitorState,
}

impl<S: MetricsSource + 'static> MetricsMonitor<S> {
    /// Builds a monitor bound to the current tokio runtime.
    pub fn new(interval: Duration, source: S) -> Result<Self, MonitorError> {
        let runtime = Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;
        Self::with_handle(interval, source, runtime)
    }

    pub fn with_handle(
        interval: Duration,
        source: S,
        runtime: Handle,
    ) -> Result<Self, MonitorError> {
        validate_interval(interval)?;
        Ok(Self {
            interval,
            source: Arc::new(Mutex::new(source)),
            subscriber: Arc::new(RwLock::new(None)),
            runtime,
            state: MonitorState::Idle,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, MonitorState::Running { .. })
    }

    /// Replaces the registered subscriber. The monitor keeps only a weak
    /// reference; once the caller drops its `Arc`, snapshots are discarded.
    pub fn set_subscriber<T: SnapshotSubscriber + 'static>(&self, subscriber: &Arc<T>) {
        let weak: Weak<T> = Arc::downgrade(subscriber);
        let weak: Weak<dyn SnapshotSubscriber> = weak;
        *write_slot(&self.subscriber) = Some(weak);
    }

    pub fn clear_subscriber(&self) {
        *write_slot(&self.subscriber) = None;
    }

    /// Publishes one snapshot immediately, then one every interval.
    /// Restarting a running monitor replaces its schedule.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        validate_interval(self.interval)?;
        if self.is_running() {
            debug!("Monitor already running, restarting schedule");
            self.stop();
        }

        let cancel = CancellationToken::new();
        let task = self.runtime.spawn(run_schedule(
            self.interval,
            self.source.clone(),
            self.subscriber.clone(),
            cancel.clone(),
        ));
        self.state = MonitorState::Running {
            interval: self.interval,
            cancel,
            task,
        };
        info!("Metrics monitor started with interval {:?}", self.interval);
        Ok(())
    }

    /// Cancels the schedule. No tick begins delivery after this returns.
    pub fn stop(&mut self) {
        if let MonitorState::Running {
            interval,
            cancel,
            task,
        } = std::mem::replace(&mut self.state, MonitorState::Idle)
        {
            cancel.cancel();
            task.abort();
            info!("Metrics monitor stopped (interval {:?})", interval);
        }
    }

    /// Samples every metric once without publishing.
    pub fn sample_now(&self) -> MetricsSnapshot {
        let mut source = lock_source(&self.source);
        collect_snapshot(&mut *source)
    }

    /// Takes a priming sample, waits `settle`, and returns a second one.
    /// Rate metrics such as CPU need two samples before they read non-zero.
    pub async fn sample_settled(&self, settle: Duration) -> MetricsSnapshot {
        let _ = self.sample_now();
        tokio::time::sleep(settle).await;
        self.sample_now()
    }
}

impl<S: MetricsSource + 'static> Drop for MetricsMonitor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_interval(interval: Duration) -> Result<(), MonitorError> {
    if interval.is_zero() {
        return Err(MonitorError::InvalidInterval(interval));
    }
    Ok(())
}

/// Reads all seven metrics back to back. The OS calls block briefly; they
/// are kept sequential so every field describes the same moment.
pub fn collect_snapshot<S: MetricsSource + ?Sized>(source: &mut S) -> MetricsSnapshot {
    source.snapshot()
}

async fn run_schedule<S: MetricsSource>(
    interval: Duration,
    source: Arc<Mutex<S>>,
    subscriber: SubscriberSlot,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        // The first tick completes immediately, giving the initial sample.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break;
            }
            _ = ticker.tick() => {}
        }

        let snapshot = {
            let mut source = lock_source(&source);
            collect_snapshot(&mut *source)
        };
        if cancel.is_cancelled() {
            break;
        }
        debug!(
            cpu = snapshot.cpu_usage_percent,
            memory_mb = snapshot.memory_usage_mb,
            "Sampled metrics"
        );
        deliver(&subscriber, snapshot);
    }
}

fn deliver(slot: &SubscriberSlot, snapshot: MetricsSnapshot) {
    let target = {
        let guard = match slot.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().and_then(Weak::upgrade)
    };
    match target {
        Some(subscriber) => subscriber.on_snapshot(snapshot),
        None => trace!("No live subscriber, dropping snapshot"),
    }
}

fn lock_source<S>(source: &Mutex<S>) -> std::sync::MutexGuard<'_, S> {
    match source.lock() {
        Ok(g) => g,
        // Keep sampling even if a previous tick panicked.
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_slot(
    slot: &SubscriberSlot,
) -> std::sync::RwLockWriteGuard<'_, Option<Weak<dyn SnapshotSubscriber>>> {
    match slot.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
