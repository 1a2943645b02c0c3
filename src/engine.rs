//! One spawn attempt for one anchor.
//!
//! search → shell → furnishing → perimeter → registration → announcement

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::anchor::{Anchor, AnchorSource, Ineligible, check_eligibility};
use crate::clock::seconds;
use crate::config::Config;
use crate::entity::{EntityFactory, EntityId, Inventory};
use crate::geometry::{GeometryProvider, Pose};
use crate::hooks::{NoHooks, SpawnHooks};
use crate::lifecycle::LifecycleStore;
use crate::notify::{Notifier, announce_spawn};
use crate::placement::find_spawn_point;
use crate::structures::{FurnishReport, InteriorPopulator, Perimeter, StructureFactory};

/// Host services the spawner talks to
#[derive(Clone)]
pub struct Host {
    pub geometry: Arc<dyn GeometryProvider>,
    pub entities: Arc<dyn EntityFactory>,
    pub inventory: Arc<dyn Inventory>,
    pub anchors: Arc<dyn AnchorSource>,
    pub notifier: Arc<dyn Notifier>,
    pub hooks: Arc<dyn SpawnHooks>,
}

impl Host {
    /// All services backed by one object, with no hooks registered
    pub fn uniform<H>(host: Arc<H>) -> Self
    where
        H: GeometryProvider + EntityFactory + Inventory + AnchorSource + Notifier + 'static,
    {
        Self {
            geometry: host.clone(),
            entities: host.clone(),
            inventory: host.clone(),
            anchors: host.clone(),
            notifier: host,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SpawnHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// A camp that made it into the world
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedCamp {
    pub structure: EntityId,
    pub pose: Pose,
    pub removal_deadline: DateTime<Utc>,
    pub sub_objects: Vec<EntityId>,
    pub furnishing: FurnishReport,
}

/// Result of trying one anchor
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnOutcome {
    Ineligible(Ineligible),
    PlacementNotFound,
    CreateFailed,
    Spawned(SpawnedCamp),
}

impl SpawnOutcome {
    pub fn is_spawned(&self) -> bool {
        matches!(self, SpawnOutcome::Spawned(_))
    }
}

/// Runs spawn attempts against a host and records the results
#[derive(Clone)]
pub struct Engine {
    host: Host,
    store: LifecycleStore,
}

impl Engine {
    pub fn new(host: Host, store: LifecycleStore) -> Self {
        Self { host, store }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn store(&self) -> &LifecycleStore {
        &self.store
    }

    /// Check `anchor` and, if eligible, try to spawn a camp near it
    pub fn try_anchor<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        config: &Config,
        anchor: &Anchor,
    ) -> SpawnOutcome {
        if let Err(reason) = check_eligibility(anchor, &*self.host.geometry) {
            debug!("Anchor {} skipped: {:?}", anchor.id, reason);
            return SpawnOutcome::Ineligible(reason);
        }
        self.attempt_spawn(rng, config, anchor)
    }

    /// Spawn a camp near `anchor` without checking eligibility
    pub fn attempt_spawn<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        config: &Config,
        anchor: &Anchor,
    ) -> SpawnOutcome {
        let host = &self.host;

        let Some(pose) = find_spawn_point(rng, &*host.geometry, &config.search, anchor.position)
        else {
            debug!("No camp position near anchor {}", anchor.id);
            return SpawnOutcome::PlacementNotFound;
        };

        let Some(structure) =
            StructureFactory::new(&*host.entities).build(rng, &config.structure, pose)
        else {
            return SpawnOutcome::CreateFailed;
        };

        let removal_deadline = self
            .store
            .register(structure, seconds(config.structure.lifetime_secs));

        let mut sub_objects = Vec::new();
        let mut register = |id: EntityId| {
            self.store.add_sub_object(structure, id);
            sub_objects.push(id);
        };

        let furnishing = InteriorPopulator::new(
            &*host.geometry,
            &*host.entities,
            &*host.inventory,
            &*host.hooks,
        )
        .populate(
            rng,
            structure,
            pose.position,
            &config.interior,
            &config.loot.items,
            &mut register,
        );

        let perimeter = Perimeter::new(&*host.geometry, &*host.entities, &*host.inventory);
        if config.hazards.enabled {
            for id in perimeter.place_hazards(rng, structure, pose.position, &config.hazards) {
                register(id);
            }
        }
        if config.defense.enabled {
            if let Some(id) = perimeter.rig_defense(rng, structure, pose, &config.defense) {
                register(id);
            }
        }

        announce_spawn(&*host.notifier, &config.notification, anchor.id, pose.position);
        info!(
            "Spawned camp {} near {} at ({:.1}, {:.1}, {:.1}) with {} objects, removal at {}",
            structure,
            anchor.id,
            pose.position.x,
            pose.position.y,
            pose.position.z,
            sub_objects.len(),
            removal_deadline
        );

        SpawnOutcome::Spawned(SpawnedCamp {
            structure,
            pose,
            removal_deadline,
            sub_objects,
            furnishing,
        })
    }
}
