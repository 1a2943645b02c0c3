//! Entity handles and the host object primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{OrientedBox, Pose};

/// Stable network id of a host entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cosmetic skin id (0 = default look)
pub type SkinId = u64;

/// A stack of items about to go into a container or weapon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub template: String,
    pub amount: u32,
    pub skin: SkinId,
}

impl ItemStack {
    pub fn new(template: impl Into<String>, amount: u32, skin: SkinId) -> Self {
        Self {
            template: template.into(),
            amount,
            skin,
        }
    }
}

/// How an armed defensive object treats actors around it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Shoots anyone in range
    #[default]
    Hostile,
    /// Only returns fire
    Peaceful,
}

/// Creation, destruction and fixture setup of host objects.
///
/// Every method must tolerate ids that no longer resolve: objects can vanish
/// at any time without the core being told.
pub trait EntityFactory: Send + Sync {
    /// Create and spawn an object, `None` when the template is unknown or
    /// the host refused
    fn create(&self, template: &str, pose: Pose) -> Option<EntityId>;

    fn destroy(&self, id: EntityId);

    /// Whether `id` still resolves to a live object
    fn exists(&self, id: EntityId) -> bool;

    /// World-space bounding volume the template would occupy at `pose`,
    /// without spawning it
    fn bounds(&self, template: &str, pose: Pose) -> Option<OrientedBox>;

    fn set_skin(&self, id: EntityId, skin: SkinId);

    /// Attach `child` so it moves with and belongs to `parent`
    fn set_parent(&self, child: EntityId, parent: EntityId);

    fn set_health(&self, id: EntityId, health: f32);

    /// Empty the authorization list inherited from placement
    fn clear_authorizations(&self, id: EntityId);

    /// Door fixture of a structure, if it has one
    fn door_of(&self, structure: EntityId) -> Option<EntityId>;

    /// Hand the lock on `door` to the system owner so nobody can open it
    fn reset_lock_owner(&self, door: EntityId);

    fn set_posture(&self, id: EntityId, posture: Posture);
}

/// Item-level operations on containers and weapons
pub trait Inventory: Send + Sync {
    /// Whether `template` names a known item
    fn item_exists(&self, template: &str) -> bool;

    /// Slot count of `container`, `None` if it holds no items
    fn capacity(&self, container: EntityId) -> Option<usize>;

    fn free_slots(&self, container: EntityId) -> usize;

    /// Move `stack` into `container`; `false` means it was discarded
    fn insert(&self, container: EntityId, stack: ItemStack) -> bool;

    /// Put `weapon` with `ammo` loaded into the primary slot of `holder`
    fn load_weapon(&self, holder: EntityId, weapon: &str, ammo: ItemStack) -> bool;
}
