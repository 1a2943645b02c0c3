//! Tracking live camps until they are torn down.
//!
//! Each camp has one record holding its owned objects and an absolute
//! removal deadline. Records are saved after every change so a restart can
//! pick up where the last process stopped:
//!
//! ```text
//!   register ──> Active ──timer──> Expiring ──> (purged)
//!                  │
//!   resume: deadline passed ──────────────────> (purged, no timer)
//!   shutdown: any state ──────────────────────> (purged)
//! ```
//!
//! All mutations go through one mutex, so removal timers and the scanner can
//! run on different threads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, remaining};
use crate::entity::{EntityFactory, EntityId};
use crate::persistence::{LifecycleRecord, Persistence, StoredData};

/// Persistence key of the camp document
pub const DATA_KEY: &str = "camps";

/// Where a tracked camp is in its removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalState {
    /// Deadline ahead, timer armed
    Active,
    /// Timer fired, objects being destroyed
    Expiring,
}

/// What `resume` did with the saved records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub scheduled: usize,
    /// Past their deadline, removed on the spot
    pub forced: usize,
    /// Structure already gone, record dropped
    pub stale: usize,
}

struct Tracked {
    record: LifecycleRecord,
    state: RemovalState,
    timer: Option<JoinHandle<()>>,
}

impl Tracked {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Shared {
    camps: Mutex<BTreeMap<EntityId, Tracked>>,
    entities: Arc<dyn EntityFactory>,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
}

/// Registry of live camps and their removal timers.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LifecycleStore {
    shared: Arc<Shared>,
}

impl LifecycleStore {
    pub fn new(
        entities: Arc<dyn EntityFactory>,
        persistence: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                camps: Mutex::new(BTreeMap::new()),
                entities,
                persistence,
                clock,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<EntityId, Tracked>> {
        self.shared.camps.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.shared.clock.now()
    }

    /// Start tracking a freshly created camp, returning its deadline.
    ///
    /// The record is saved immediately and the removal timer armed.
    pub fn register(&self, structure: EntityId, lifetime: Duration) -> DateTime<Utc> {
        let now = self.now();
        let deadline = now + lifetime;

        let mut camps = self.lock();
        let timer = self.arm_timer(structure, lifetime.to_std().unwrap_or_default());
        if let Some(mut old) = camps.insert(
            structure,
            Tracked {
                record: LifecycleRecord::new(now, deadline),
                state: RemovalState::Active,
                timer: Some(timer),
            },
        ) {
            warn!("Structure {} registered twice, replacing its record", structure);
            old.cancel_timer();
        }
        self.persist(&camps);

        debug!("Tracking {} until {}", structure, deadline);
        deadline
    }

    /// Record `sub` as owned by `structure`. `false` if the camp is not
    /// tracked or already owns it.
    pub fn add_sub_object(&self, structure: EntityId, sub: EntityId) -> bool {
        let mut camps = self.lock();
        let Some(tracked) = camps.get_mut(&structure) else {
            return false;
        };
        if !tracked.record.add_sub_object(sub) {
            return false;
        }
        self.persist(&camps);
        true
    }

    /// Push the deadline of `structure` later. Earlier deadlines are refused.
    pub fn reschedule(&self, structure: EntityId, deadline: DateTime<Utc>) -> bool {
        let now = self.now();
        let mut camps = self.lock();
        let Some(tracked) = camps.get_mut(&structure) else {
            return false;
        };
        if tracked.state != RemovalState::Active || deadline <= tracked.record.removal_deadline {
            return false;
        }

        tracked.cancel_timer();
        tracked.record.removal_deadline = deadline;
        let delay = remaining(deadline, now).unwrap_or_default();
        tracked.timer = Some(self.arm_timer(structure, delay));
        self.persist(&camps);

        debug!("Rescheduled {} to {}", structure, deadline);
        true
    }

    /// Whether `structure` is a live camp, for damage permission checks
    pub fn is_tracked(&self, structure: EntityId) -> bool {
        self.lock().contains_key(&structure)
    }

    pub fn tracked_count(&self) -> usize {
        self.lock().len()
    }

    pub fn record(&self, structure: EntityId) -> Option<LifecycleRecord> {
        self.lock().get(&structure).map(|t| t.record.clone())
    }

    pub fn state(&self, structure: EntityId) -> Option<RemovalState> {
        self.lock().get(&structure).map(|t| t.state)
    }

    /// Removal timers that have not fired yet
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .values()
            .filter(|t| t.timer.as_ref().is_some_and(|h| !h.is_finished()))
            .count()
    }

    /// Load saved records and carry on where the last run stopped.
    ///
    /// Records past their deadline are removed right away without a timer.
    /// Records whose structure no longer exists are dropped without touching
    /// their sub-objects.
    pub fn resume(&self) -> ResumeReport {
        let saved = self.shared.persistence.load(DATA_KEY);
        let now = self.now();
        let mut report = ResumeReport::default();

        let mut camps = self.lock();
        for (structure, record) in saved.structures {
            if camps.contains_key(&structure) {
                continue;
            }
            if !self.shared.entities.exists(structure) {
                debug!("Dropping stale record for {}", structure);
                report.stale += 1;
                continue;
            }

            match remaining(record.removal_deadline, now) {
                None => {
                    info!(
                        "Structure {} expired {}s ago, removing",
                        structure,
                        (now - record.removal_deadline).num_seconds()
                    );
                    self.destroy_all(structure, &record);
                    report.forced += 1;
                }
                Some(left) => {
                    let timer = self.arm_timer(structure, left);
                    camps.insert(
                        structure,
                        Tracked {
                            record,
                            state: RemovalState::Active,
                            timer: Some(timer),
                        },
                    );
                    report.scheduled += 1;
                }
            }
        }
        self.persist(&camps);

        info!(
            "Resumed camps: {} scheduled, {} removed, {} stale",
            report.scheduled, report.forced, report.stale
        );
        report
    }

    /// Remove every tracked camp now, ignoring deadlines. Returns how many
    /// were removed.
    pub fn shutdown(&self) -> usize {
        let mut camps = self.lock();
        let drained = std::mem::take(&mut *camps);
        let count = drained.len();

        for (structure, mut tracked) in drained {
            tracked.cancel_timer();
            // a fired timer is already tearing this one down
            if tracked.state == RemovalState::Expiring {
                continue;
            }
            if self.shared.entities.exists(structure) {
                self.destroy_all(structure, &tracked.record);
            }
        }
        self.persist(&camps);

        if count > 0 {
            info!("Removed {} camps on shutdown", count);
        }
        count
    }

    /// Timer callback: tear the camp down if it is still tracked
    fn expire(&self, structure: EntityId) {
        let record = {
            let mut camps = self.lock();
            let Some(tracked) = camps.get_mut(&structure) else {
                return;
            };
            if tracked.state != RemovalState::Active {
                return;
            }
            tracked.state = RemovalState::Expiring;
            tracked.timer = None;
            tracked.record.clone()
        };

        if self.shared.entities.exists(structure) {
            self.destroy_all(structure, &record);
            info!("Structure {} lifetime over, removed", structure);
        } else {
            debug!("Structure {} already gone at expiry", structure);
        }

        let mut camps = self.lock();
        if camps
            .get(&structure)
            .is_some_and(|t| t.state == RemovalState::Expiring)
        {
            camps.remove(&structure);
            self.persist(&camps);
        }
    }

    fn destroy_all(&self, structure: EntityId, record: &LifecycleRecord) {
        let entities = &self.shared.entities;
        for &sub in &record.sub_objects {
            if entities.exists(sub) {
                entities.destroy(sub);
            }
        }
        entities.destroy(structure);
    }

    fn arm_timer(&self, structure: EntityId, after: std::time::Duration) -> JoinHandle<()> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(shared) = weak.upgrade() {
                LifecycleStore { shared }.expire(structure);
            }
        })
    }

    /// Best-effort save; a failure is logged and otherwise ignored
    fn persist(&self, camps: &BTreeMap<EntityId, Tracked>) {
        let data = StoredData {
            structures: camps
                .iter()
                .map(|(id, t)| (*id, t.record.clone()))
                .collect(),
        };
        if let Err(e) = self.shared.persistence.save(DATA_KEY, &data) {
            warn!("{}", e);
        }
    }
}
