//! Periodic scan over live anchors.
//!
//! Every tick starts a fresh scan task and aborts the previous one if it is
//! still going. A scan visits anchors one at a time and sleeps between them,
//! so an abort lands on the next sleep, never in the middle of a spawn.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info};

use crate::config::{Config, ConfigHandle, ScheduleConfig};
use crate::engine::{Engine, SpawnOutcome};
use crate::entity::EntityId;

/// Counts from one pass over the anchors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub anchors: usize,
    /// Left the world before their turn came
    pub gone: usize,
    pub ineligible: usize,
    pub not_found: usize,
    pub failed: usize,
    pub spawned: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: &SpawnOutcome) {
        self.anchors += 1;
        match outcome {
            SpawnOutcome::Ineligible(_) => self.ineligible += 1,
            SpawnOutcome::PlacementNotFound => self.not_found += 1,
            SpawnOutcome::CreateFailed => self.failed += 1,
            SpawnOutcome::Spawned(_) => self.spawned += 1,
        }
    }
}

fn period(schedule: &ScheduleConfig) -> Duration {
    Duration::from_secs_f32((schedule.frequency_minutes * 60.0).max(1.0))
}

fn spacing(schedule: &ScheduleConfig) -> Duration {
    Duration::from_secs_f32(schedule.delay_between_spawns_secs.max(0.0))
}

/// One pass over the current anchors, pausing after each one.
///
/// Only the ids are taken up front; each anchor is looked up again when its
/// turn comes, so eligibility and position are never older than that.
pub async fn run_scan(engine: Engine, config: Arc<Config>, mut rng: StdRng) -> ScanSummary {
    let source = engine.host().anchors.clone();
    let ids: Vec<EntityId> = source.live_anchors().iter().map(|a| a.id).collect();
    let delay = spacing(&config.schedule);
    let mut summary = ScanSummary::default();
    debug!("Scan started over {} anchors", ids.len());

    for id in ids {
        match source.anchor(id) {
            Some(anchor) => {
                let outcome = engine.try_anchor(&mut rng, &config, &anchor);
                summary.record(&outcome);
            }
            None => {
                debug!("Anchor {} left before its turn", id);
                summary.anchors += 1;
                summary.gone += 1;
            }
        }
        sleep(delay).await;
    }

    info!(
        "Scan finished: {} anchors, {} camps spawned, {} ineligible, {} without a spot",
        summary.anchors, summary.spawned, summary.ineligible, summary.not_found
    );
    summary
}

/// Background task driving the periodic scans
pub struct AnchorScanner {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl AnchorScanner {
    /// Start ticking. The first scan runs one full period from now.
    pub fn start(engine: Engine, config: ConfigHandle, rng: StdRng) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(drive(engine, config, rng, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Stop ticking and cancel any scan in flight.
    ///
    /// Returns once the scan has actually finished, so nothing it was in
    /// the middle of spawning can land after the caller moves on.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            let _ = join_handle.await;
        }
    }
}

impl Drop for AnchorScanner {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Aborts the wrapped scan when dropped, so cancelling the driver cancels it too
struct ScanTask(Option<JoinHandle<ScanSummary>>);

impl ScanTask {
    fn is_finished(&self) -> bool {
        self.0.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Abort and wait until the task has stopped running
    async fn cancel(mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ScanTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}

async fn drive(engine: Engine, config: ConfigHandle, mut rng: StdRng, mut stop_rx: oneshot::Receiver<()>) {
    let mut config_rx = config.subscribe();
    let mut every = period(&config_rx.borrow_and_update().schedule);
    let mut ticks = interval_at(Instant::now() + every, every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut scan: Option<ScanTask> = None;

    info!("Anchor scanner started, scanning every {:?}", every);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = period(&config_rx.borrow_and_update().schedule);
                if next != every {
                    info!("Scan period changed from {:?} to {:?}", every, next);
                    every = next;
                    ticks = interval_at(Instant::now() + every, every);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }
            }
            _ = ticks.tick() => {
                if let Some(previous) = scan.take() {
                    if !previous.is_finished() {
                        info!("Previous scan still running, restarting");
                    }
                    previous.cancel().await;
                }
                let seed: u64 = rng.r#gen();
                let task = tokio::spawn(run_scan(
                    engine.clone(),
                    config.snapshot(),
                    StdRng::seed_from_u64(seed),
                ));
                scan = Some(ScanTask(Some(task)));
            }
        }
    }

    if let Some(scan) = scan {
        scan.cancel().await;
    }
    info!("Anchor scanner stopped");
}
