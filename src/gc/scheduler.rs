//! Periodic GC scheduling: one tokio task per object type.

use super::collector::GarbageCollector;
use crate::models::ObjectType;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default delay before the first cycle.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(60);

/// Default time between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Runs [`GarbageCollector::run_cycle`] for every type on a fixed schedule.
///
/// Must be started from within a tokio runtime. Each cycle runs on the
/// blocking pool; a slow cycle delays the next tick instead of bursting.
pub struct GcScheduler {
    collector: GarbageCollector,
    initial_delay: Duration,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl GcScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(collector: GarbageCollector) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            collector,
            initial_delay: DEFAULT_INITIAL_DELAY,
            interval: DEFAULT_INTERVAL,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Sets the delay before the first cycle.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the time between cycles. Zero is raised to one millisecond.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Returns the number of running type tasks.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Spawns one task per type.
    pub fn start(&mut self, types: &[ObjectType]) {
        for object_type in types.iter().copied() {
            let collector = self.collector.clone();
            let shutdown = self.shutdown.subscribe();
            let initial_delay = self.initial_delay;
            let interval = self.interval;
            self.tasks.push(tokio::spawn(run_type_loop(
                collector,
                object_type,
                initial_delay,
                interval,
                shutdown,
            )));
        }
        info!(
            types = types.len(),
            interval_secs = self.interval.as_secs(),
            initial_delay_secs = self.initial_delay.as_secs(),
            "GC scheduler started"
        );
    }

    /// Signals every task to stop and waits for them.
    ///
    /// A cycle already running is allowed to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "GC task ended abnormally");
            }
        }
        info!("GC scheduler stopped");
    }
}

async fn run_type_loop(
    collector: GarbageCollector,
    object_type: ObjectType,
    initial_delay: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = tokio::time::Instant::now() + initial_delay;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let cycle = collector.clone();
        match tokio::task::spawn_blocking(move || cycle.run_cycle(object_type)).await {
            Ok(Ok(result)) => debug!(summary = %result.summary(), "Scheduled GC cycle finished"),
            Ok(Err(e)) => error!(%object_type, error = %e, "Scheduled GC cycle failed"),
            Err(e) => error!(%object_type, error = %e, "GC cycle task panicked"),
        }
    }
    debug!(object_type = %object_type, "GC task stopping");
}
