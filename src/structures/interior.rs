//! Furnishing the inside of a camp.
//!
//! Every unit of every configured entry gets a nested search: an outer loop
//! over floor positions and an inner loop over orientations at that spot.
//! The first pose that passes the fit-check and the pre-spawn hook wins and
//! ends both loops. A unit that never finds a pose is dropped quietly.

use glam::Vec3;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, trace, warn};

use crate::config::{InteriorConfig, InteriorEntry, ItemEntry};
use crate::entity::{EntityFactory, EntityId, Inventory};
use crate::geometry::{
    GeometryProvider, LayerMask, Pose, Shape, annulus_point, random_yaw, surface_rotation,
};
use crate::hooks::{SpawnHooks, Verdict};
use crate::loot::fill_container;

/// Tally of one furnishing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FurnishReport {
    pub committed: usize,
    /// Units skipped by their spawn chance roll
    pub gated: usize,
    /// Units that found no pose
    pub no_fit: usize,
    /// Poses turned down by the pre-spawn hook
    pub vetoed: usize,
    pub create_failed: usize,
}

enum Unit {
    Committed(EntityId),
    Gated,
    NoFit,
    CreateFailed,
}

pub struct InteriorPopulator<'a> {
    geometry: &'a dyn GeometryProvider,
    entities: &'a dyn EntityFactory,
    inventory: &'a dyn Inventory,
    hooks: &'a dyn SpawnHooks,
}

impl<'a> InteriorPopulator<'a> {
    pub fn new(
        geometry: &'a dyn GeometryProvider,
        entities: &'a dyn EntityFactory,
        inventory: &'a dyn Inventory,
        hooks: &'a dyn SpawnHooks,
    ) -> Self {
        Self {
            geometry,
            entities,
            inventory,
            hooks,
        }
    }

    /// Furnish `structure` standing at `center`.
    ///
    /// `register` is called with each committed object's id before the
    /// post-spawn hook sees it.
    pub fn populate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        structure: EntityId,
        center: Vec3,
        interior: &InteriorConfig,
        loot: &[ItemEntry],
        register: &mut dyn FnMut(EntityId),
    ) -> FurnishReport {
        let mut report = FurnishReport::default();

        for entry in &interior.entries {
            let count = roll_count(rng, entry.min_count, entry.max_count);
            for _ in 0..count {
                match self.place_unit(rng, structure, center, entry, interior, loot, &mut report) {
                    Unit::Committed(id) => {
                        register(id);
                        self.hooks.post_spawn(structure, id);
                        report.committed += 1;
                    }
                    Unit::Gated => report.gated += 1,
                    Unit::NoFit => {
                        trace!("No room for {} in {}", entry.template, structure);
                        report.no_fit += 1;
                    }
                    Unit::CreateFailed => report.create_failed += 1,
                }
            }
        }

        debug!("Furnished {}: {:?}", structure, report);
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn place_unit<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        structure: EntityId,
        center: Vec3,
        entry: &InteriorEntry,
        interior: &InteriorConfig,
        loot: &[ItemEntry],
        report: &mut FurnishReport,
    ) -> Unit {
        if let Some(chance) = entry.spawn_chance {
            if !rng.gen_bool(f64::from(chance / 100.0).clamp(0.0, 1.0)) {
                return Unit::Gated;
            }
        }

        for _ in 0..interior.position_attempts {
            let point = annulus_point(rng, self.geometry, center, 0.0, interior.radius);
            let Some(hit) =
                self.geometry
                    .ground_probe(point, interior.ground_probe_range, LayerMask::TERRAIN)
            else {
                continue;
            };

            for _ in 0..interior.rotation_attempts {
                let pose = Pose::new(hit.point, surface_rotation(hit.normal, random_yaw(rng)));
                if !self.fits(structure, &entry.template, pose) {
                    continue;
                }
                // a veto only rules out this pose
                if self.hooks.pre_spawn(structure, &entry.template, &pose) == Verdict::Deny {
                    report.vetoed += 1;
                    continue;
                }
                return self.commit(rng, entry, pose, loot);
            }
        }

        Unit::NoFit
    }

    fn commit<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        entry: &InteriorEntry,
        pose: Pose,
        loot: &[ItemEntry],
    ) -> Unit {
        let Some(id) = self.entities.create(&entry.template, pose) else {
            warn!("Failed to create interior object '{}'", entry.template);
            return Unit::CreateFailed;
        };

        if let Some(&skin) = entry.skin_ids.choose(rng) {
            self.entities.set_skin(id, skin);
        }

        if let Some(capacity) = self.inventory.capacity(id) {
            let fill = fill_container(rng, self.inventory, id, capacity, loot, entry.fill_percent);
            trace!("Filled {} {}: {:?}", entry.template, id, fill);
        }

        debug!("Placed {} {} at {:?}", entry.template, id, pose.position);
        Unit::Committed(id)
    }

    /// Whether `template` at `pose` touches nothing but `structure`.
    ///
    /// Static colliders without an owner count as foreign.
    pub fn fits(&self, structure: EntityId, template: &str, pose: Pose) -> bool {
        let Some(bounds) = self.entities.bounds(template, pose) else {
            return false;
        };
        self.geometry
            .overlap(&Shape::Box(bounds), LayerMask::ENTITIES)
            .iter()
            .all(|c| c.owner == Some(structure))
    }
}

pub(crate) fn roll_count<R: Rng + ?Sized>(rng: &mut R, min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::NoHooks;
    use crate::sandbox::Sandbox;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shelter(sandbox: &Sandbox, center: Vec3) -> EntityId {
        sandbox
            .create("shelter.wood", Pose::at(center))
            .expect("shelter template known")
    }

    fn crowded_interior() -> InteriorConfig {
        let mut interior = Config::default().interior;
        for entry in &mut interior.entries {
            entry.min_count = 3;
            entry.max_count = 3;
        }
        interior
    }

    #[test]
    fn test_committed_objects_do_not_overlap() {
        let loot = Config::default().loot.items;
        let interior = crowded_interior();

        for seed in 0..20 {
            let sandbox = Sandbox::flat(10.0);
            let center = Vec3::new(100.0, 10.0, 100.0);
            let structure = shelter(&sandbox, center);
            let populator = InteriorPopulator::new(&sandbox, &sandbox, &sandbox, &NoHooks);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut placed = Vec::new();

            populator.populate(&mut rng, structure, center, &interior, &loot, &mut |id: EntityId| {
                placed.push(id)
            });

            assert!(!placed.is_empty());
            for (i, a) in placed.iter().enumerate() {
                let (a_min, a_max) = sandbox.world_bounds(*a).unwrap().aabb();
                let p = sandbox.entity(*a).unwrap().pose.position;
                assert!((p - center).length() <= interior.radius + 1e-3);
                for b in &placed[i + 1..] {
                    let (b_min, b_max) = sandbox.world_bounds(*b).unwrap().aabb();
                    let disjoint = a_max.cmplt(b_min).any() || b_max.cmplt(a_min).any();
                    assert!(disjoint, "seed {seed}: {a} overlaps {b}");
                }
            }
        }
    }

    struct DenyAll {
        asked: AtomicUsize,
        spawned: AtomicUsize,
    }

    impl SpawnHooks for DenyAll {
        fn pre_spawn(&self, _structure: EntityId, _template: &str, _pose: &Pose) -> Verdict {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Verdict::Deny
        }
        fn post_spawn(&self, _structure: EntityId, _object: EntityId) {
            self.spawned.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_veto_blocks_every_commit() {
        let sandbox = Sandbox::flat(10.0);
        let center = Vec3::new(50.0, 10.0, 50.0);
        let structure = shelter(&sandbox, center);
        let hooks = DenyAll {
            asked: AtomicUsize::new(0),
            spawned: AtomicUsize::new(0),
        };
        let mut interior = Config::default().interior;
        interior.position_attempts = 3;
        interior.rotation_attempts = 2;
        let populator = InteriorPopulator::new(&sandbox, &sandbox, &sandbox, &hooks);
        let mut rng = StdRng::seed_from_u64(7);
        let mut placed = Vec::new();

        let report = populator.populate(&mut rng, structure, center, &interior, &[], &mut |id: EntityId| {
            placed.push(id)
        });

        assert!(placed.is_empty());
        assert_eq!(report.committed, 0);
        assert!(hooks.asked.load(Ordering::SeqCst) > 0);
        assert_eq!(hooks.spawned.load(Ordering::SeqCst), 0);
        assert_eq!(sandbox.live_count(), 2); // shelter and its door
    }

    #[test]
    fn test_zero_spawn_chance_gates_all_units() {
        let sandbox = Sandbox::flat(10.0);
        let center = Vec3::new(50.0, 10.0, 50.0);
        let structure = shelter(&sandbox, center);
        let mut interior = crowded_interior();
        for entry in &mut interior.entries {
            entry.spawn_chance = Some(0.0);
        }
        let populator = InteriorPopulator::new(&sandbox, &sandbox, &sandbox, &NoHooks);
        let mut rng = StdRng::seed_from_u64(1);

        let report = populator.populate(&mut rng, structure, center, &interior, &[], &mut |_: EntityId| {});

        assert_eq!(report.gated, 6);
        assert_eq!(report.committed, 0);
    }

    #[test]
    fn test_foreign_object_blocks_fit() {
        let sandbox = Sandbox::flat(10.0);
        let center = Vec3::new(50.0, 10.0, 50.0);
        let structure = shelter(&sandbox, center);
        // something big enough to fill the whole floor
        sandbox.create("crate.large", Pose::at(center)).unwrap();
        let interior = Config::default().interior;
        let populator = InteriorPopulator::new(&sandbox, &sandbox, &sandbox, &NoHooks);
        let mut rng = StdRng::seed_from_u64(2);

        let report = populator.populate(&mut rng, structure, center, &interior, &[], &mut |_: EntityId| {});

        assert_eq!(report.committed, 0);
        assert!(report.no_fit > 0);
        assert!(!populator.fits(structure, "box.wooden", Pose::at(center)));
    }

    #[test]
    fn test_containers_filled_on_commit() {
        let sandbox = Sandbox::flat(10.0);
        let center = Vec3::new(50.0, 10.0, 50.0);
        let structure = shelter(&sandbox, center);
        let mut interior = Config::default().interior;
        interior.entries.retain(|e| e.template == "box.wooden");
        interior.entries[0].min_count = 1;
        interior.entries[0].max_count = 1;
        interior.entries[0].fill_percent = 100;
        interior.entries[0].skin_ids = vec![5];
        let loot = vec![ItemEntry::new("scrap", 10, 10), ItemEntry::new("metal.fragments", 3, 3)];
        let populator = InteriorPopulator::new(&sandbox, &sandbox, &sandbox, &NoHooks);
        let mut rng = StdRng::seed_from_u64(3);
        let mut placed = Vec::new();

        populator.populate(&mut rng, structure, center, &interior, &loot, &mut |id: EntityId| placed.push(id));

        assert_eq!(placed.len(), 1);
        let entity = sandbox.entity(placed[0]).unwrap();
        assert_eq!(entity.skin, 5);
        let mut contents: Vec<(String, u32)> = entity
            .contents
            .iter()
            .map(|s| (s.template.clone(), s.amount))
            .collect();
        contents.sort();
        assert_eq!(
            contents,
            vec![("metal.fragments".to_string(), 3), ("scrap".to_string(), 10)]
        );
    }
}
