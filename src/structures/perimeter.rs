//! Hazards around a camp and the defensive object guarding it.

use glam::{Quat, Vec3};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{DefenseConfig, HazardConfig};
use crate::entity::{EntityFactory, EntityId, Inventory, ItemStack};
use crate::geometry::{
    GeometryProvider, LayerMask, Pose, annulus_point, random_yaw, surface_rotation,
};
use crate::loot::roll_amount;

use super::interior::roll_count;

pub struct Perimeter<'a> {
    geometry: &'a dyn GeometryProvider,
    entities: &'a dyn EntityFactory,
    inventory: &'a dyn Inventory,
}

impl<'a> Perimeter<'a> {
    pub fn new(
        geometry: &'a dyn GeometryProvider,
        entities: &'a dyn EntityFactory,
        inventory: &'a dyn Inventory,
    ) -> Self {
        Self {
            geometry,
            entities,
            inventory,
        }
    }

    /// Scatter hazards in a ring around `center`, parented to `structure`.
    ///
    /// Hazards are not fit-checked against each other. A sample with no
    /// ground under it is dropped. Returns the created ids.
    pub fn place_hazards<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        structure: EntityId,
        center: Vec3,
        config: &HazardConfig,
    ) -> Vec<EntityId> {
        let count = roll_count(rng, config.min_count, config.max_count);
        let mut placed = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let point = annulus_point(rng, self.geometry, center, config.min_radius, config.max_radius);
            let Some(hit) =
                self.geometry
                    .ground_probe(point, config.ground_probe_range, LayerMask::TERRAIN)
            else {
                continue;
            };

            let pose = Pose::new(hit.point, surface_rotation(hit.normal, random_yaw(rng)));
            let Some(id) = self.entities.create(&config.template, pose) else {
                warn!("Failed to create hazard '{}'", config.template);
                continue;
            };
            self.entities.set_parent(id, structure);
            placed.push(id);
        }

        debug!("Placed {}/{} hazards around {}", placed.len(), count, structure);
        placed
    }

    /// Mount the defensive object on `structure` and arm it
    pub fn rig_defense<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        structure: EntityId,
        structure_pose: Pose,
        config: &DefenseConfig,
    ) -> Option<EntityId> {
        let local = Pose::new(
            Vec3::from(config.offset),
            Quat::from_rotation_y(config.yaw_degrees.to_radians()),
        );
        let pose = structure_pose.compose(&local);

        let Some(id) = self.entities.create(&config.template, pose) else {
            warn!("Failed to create defense '{}'", config.template);
            return None;
        };
        self.entities.set_parent(id, structure);

        let loaded = loaded_ammo(rng, config);
        let ammo = ItemStack::new(&config.ammo.template, loaded, config.ammo.skin);
        if !self.inventory.load_weapon(id, &config.weapon, ammo) {
            warn!("Could not load '{}' into {}", config.weapon, id);
        }

        for entry in &config.reserve_ammo {
            if self.inventory.free_slots(id) == 0 {
                break;
            }
            if entry.max_amount == 0 {
                continue;
            }
            let amount = roll_amount(rng, entry);
            if !self.inventory.insert(id, ItemStack::new(&entry.template, amount, entry.skin)) {
                debug!("Reserve {}x{} refused by {}", amount, entry.template, id);
            }
        }

        self.entities.set_posture(id, config.posture);
        debug!("Rigged {} {} on {} ({} rounds)", config.template, id, structure, loaded);
        Some(id)
    }
}

/// Ammo for the primary slot: a draw from the entry's range, capped by the
/// magazine
pub fn loaded_ammo<R: Rng + ?Sized>(rng: &mut R, config: &DefenseConfig) -> u32 {
    roll_amount(rng, &config.ammo)
        .clamp(config.ammo.min_amount, config.ammo.max_amount.max(config.ammo.min_amount))
        .min(config.magazine_capacity)
}
