//! Loading, reloading and unloading the spawner as a whole.

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use tracing::info;

use crate::clock::Clock;
use crate::config::{Config, ConfigHandle};
use crate::engine::{Engine, Host};
use crate::entity::EntityId;
use crate::error::Result;
use crate::lifecycle::{LifecycleStore, ResumeReport};
use crate::persistence::Persistence;
use crate::scanner::AnchorScanner;

/// A running spawner
pub struct Runtime {
    engine: Engine,
    config: ConfigHandle,
    scanner: Option<AnchorScanner>,
    resumed: ResumeReport,
}

impl Runtime {
    /// Validate `config`, settle saved camps, then start the periodic scan.
    ///
    /// Saved camps are resumed before anything else is scheduled, so an
    /// expired one is gone before the first timer exists.
    pub fn start(
        config: Config,
        host: Host,
        persistence: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;

        let store = LifecycleStore::new(host.entities.clone(), persistence, clock);
        let resumed = store.resume();

        let engine = Engine::new(host, store);
        let config = ConfigHandle::new(config);
        let scanner = AnchorScanner::start(engine.clone(), config.clone(), rng);

        info!("Camp spawner running");
        Ok(Self {
            engine,
            config,
            scanner: Some(scanner),
            resumed,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &LifecycleStore {
        self.engine.store()
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.snapshot()
    }

    /// What happened to the saved camps at start
    pub fn resumed(&self) -> ResumeReport {
        self.resumed
    }

    /// Whether damage rules should treat `structure` as a raidable camp
    pub fn is_tracked(&self, structure: EntityId) -> bool {
        self.store().is_tracked(structure)
    }

    /// Swap in a new config; scans already running keep their snapshot
    pub fn reload(&self, config: Config) -> Result<()> {
        self.config.reload(config)?;
        info!("Config reloaded");
        Ok(())
    }

    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<()> {
        self.reload(Config::load_or_init(path)?)
    }

    /// Stop scanning and remove every camp. Returns how many were removed.
    pub async fn unload(mut self) -> usize {
        if let Some(scanner) = self.scanner.take() {
            scanner.stop().await;
        }
        let removed = self.engine.store().shutdown();
        info!("Camp spawner unloaded");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::clock::{SystemClock, TokioClock};
    use crate::entity::{EntityFactory, Posture, SkinId};
    use crate::error::Error;
    use crate::geometry::{OrientedBox, Pose};
    use crate::hooks::NoHooks;
    use crate::lifecycle::DATA_KEY;
    use crate::persistence::{LifecycleRecord, MemoryStore, StoredData};
    use crate::sandbox::Sandbox;
    use chrono::{Duration, Utc};
    use glam::Vec3;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration as StdDuration;

    fn sandbox_with_anchor() -> Arc<Sandbox> {
        let sandbox = Arc::new(Sandbox::flat(2.0));
        sandbox.add_anchor(Anchor::standing(EntityId(900), Vec3::new(128.0, 2.0, 128.0)));
        sandbox
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_aborts_start() {
        let sandbox = sandbox_with_anchor();
        let mut config = Config::default();
        config.search.min_radius = 60.0;

        let result = Runtime::start(
            config,
            Host::uniform(sandbox.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(TokioClock::new()),
            StdRng::seed_from_u64(1),
        );

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_settles_saved_camps() {
        let sandbox = sandbox_with_anchor();
        let old = sandbox.create("shelter.wood", Pose::at(Vec3::new(20.0, 2.0, 20.0))).unwrap();
        let live = sandbox.create("shelter.wood", Pose::at(Vec3::new(220.0, 2.0, 20.0))).unwrap();
        let now = Utc::now();
        let mut data = StoredData::default();
        data.structures.insert(
            old,
            LifecycleRecord::new(now - Duration::seconds(900), now - Duration::seconds(300)),
        );
        data.structures.insert(
            live,
            LifecycleRecord::new(now - Duration::seconds(100), now + Duration::seconds(500)),
        );
        let persistence = Arc::new(MemoryStore::new());
        persistence.seed(DATA_KEY, &data).unwrap();

        let runtime = Runtime::start(
            Config::default(),
            Host::uniform(sandbox.clone()),
            persistence,
            Arc::new(TokioClock::starting_at(now)),
            StdRng::seed_from_u64(2),
        )
        .unwrap();

        assert_eq!(runtime.resumed().forced, 1);
        assert_eq!(runtime.resumed().scheduled, 1);
        assert!(!sandbox.exists(old));
        assert!(runtime.is_tracked(live));
        assert!(!runtime.is_tracked(old));

        runtime.unload().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_removes_everything() {
        let sandbox = sandbox_with_anchor();
        let mut config = Config::default();
        config.schedule.frequency_minutes = 1.0;
        config.search.attempts = 30;
        let runtime = Runtime::start(
            config,
            Host::uniform(sandbox.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(TokioClock::new()),
            StdRng::seed_from_u64(3),
        )
        .unwrap();

        tokio::time::sleep(StdDuration::from_secs(61)).await;
        assert_eq!(runtime.store().tracked_count(), 1);
        assert!(sandbox.live_count() > 1);

        assert_eq!(runtime.unload().await, 1);
        assert_eq!(sandbox.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_rejects_invalid_config() {
        let sandbox = sandbox_with_anchor();
        let runtime = Runtime::start(
            Config::default(),
            Host::uniform(sandbox),
            Arc::new(MemoryStore::new()),
            Arc::new(TokioClock::new()),
            StdRng::seed_from_u64(4),
        )
        .unwrap();

        let mut bad = Config::default();
        bad.structure.lifetime_secs = 0.0;
        assert!(runtime.reload(bad).is_err());

        let mut good = Config::default();
        good.structure.lifetime_secs = 30.0;
        runtime.reload(good).unwrap();
        assert_eq!(runtime.config().structure.lifetime_secs, 30.0);

        runtime.unload().await;
    }

    /// Shelter creation that blocks its worker thread for a while
    struct SlowShelters {
        inner: Arc<Sandbox>,
        started: AtomicBool,
    }

    impl EntityFactory for SlowShelters {
        fn create(&self, template: &str, pose: Pose) -> Option<EntityId> {
            if template == "shelter.wood" {
                self.started.store(true, Ordering::SeqCst);
                std::thread::sleep(StdDuration::from_millis(400));
            }
            self.inner.create(template, pose)
        }
        fn destroy(&self, id: EntityId) {
            self.inner.destroy(id)
        }
        fn exists(&self, id: EntityId) -> bool {
            self.inner.exists(id)
        }
        fn bounds(&self, template: &str, pose: Pose) -> Option<OrientedBox> {
            self.inner.bounds(template, pose)
        }
        fn set_skin(&self, id: EntityId, skin: SkinId) {
            self.inner.set_skin(id, skin)
        }
        fn set_parent(&self, child: EntityId, parent: EntityId) {
            self.inner.set_parent(child, parent)
        }
        fn set_health(&self, id: EntityId, health: f32) {
            self.inner.set_health(id, health)
        }
        fn clear_authorizations(&self, id: EntityId) {
            self.inner.clear_authorizations(id)
        }
        fn door_of(&self, structure: EntityId) -> Option<EntityId> {
            self.inner.door_of(structure)
        }
        fn reset_lock_owner(&self, door: EntityId) {
            self.inner.reset_lock_owner(door)
        }
        fn set_posture(&self, id: EntityId, posture: Posture) {
            self.inner.set_posture(id, posture)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unload_waits_for_spawn_in_progress() {
        let sandbox = sandbox_with_anchor();
        let slow = Arc::new(SlowShelters {
            inner: sandbox.clone(),
            started: AtomicBool::new(false),
        });
        let host = Host {
            geometry: sandbox.clone(),
            entities: slow.clone(),
            inventory: sandbox.clone(),
            anchors: sandbox.clone(),
            notifier: sandbox.clone(),
            hooks: Arc::new(NoHooks),
        };
        let mut config = Config::default();
        config.schedule.frequency_minutes = 1.0 / 60.0;
        config.search.attempts = 30;
        let persistence = Arc::new(MemoryStore::new());
        let runtime = Runtime::start(
            config,
            host,
            persistence.clone(),
            Arc::new(SystemClock),
            StdRng::seed_from_u64(5),
        )
        .unwrap();

        let mut polls = 0;
        while !slow.started.load(Ordering::SeqCst) {
            assert!(polls < 500, "no shelter creation started");
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            polls += 1;
        }

        assert_eq!(runtime.unload().await, 1);
        assert!(sandbox.with_template("shelter.wood").is_empty());
        assert_eq!(sandbox.live_count(), 0);
        assert!(persistence.load(DATA_KEY).structures.is_empty());
    }
}
