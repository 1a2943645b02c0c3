//! Live actors that camps get spawned around.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::geometry::{GeometryProvider, ZoneKind};

/// What an actor is currently riding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mount {
    Boat,
    Aircraft,
    Vehicle,
    Chair,
}

/// Snapshot of one live actor at scan time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: EntityId,
    pub position: Vec3,
    pub wounded: bool,
    pub sleeping: bool,
    pub swimming: bool,
    pub mount: Option<Mount>,
    pub grounded: bool,
    /// Standing inside territory they are authorized in
    pub building_authed: bool,
    pub near_enemy_base: bool,
}

impl Anchor {
    /// A healthy, grounded, unmounted actor
    pub fn standing(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            position,
            wounded: false,
            sleeping: false,
            swimming: false,
            mount: None,
            grounded: true,
            building_authed: false,
            near_enemy_base: false,
        }
    }
}

/// Why an anchor was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    Wounded,
    Sleeping,
    Swimming,
    Mounted(Mount),
    Airborne,
    InOwnTerritory,
    NearEnemyBase,
    InLandmark,
}

/// Host listing of current live actors
pub trait AnchorSource: Send + Sync {
    fn live_anchors(&self) -> Vec<Anchor>;

    /// Current state of one actor, `None` once it has left
    fn anchor(&self, id: EntityId) -> Option<Anchor> {
        self.live_anchors().into_iter().find(|a| a.id == id)
    }
}

/// Check every eligibility rule, reporting the first that fails
pub fn check_eligibility(anchor: &Anchor, geometry: &dyn GeometryProvider) -> Result<(), Ineligible> {
    if anchor.wounded {
        return Err(Ineligible::Wounded);
    }
    if anchor.sleeping {
        return Err(Ineligible::Sleeping);
    }
    if anchor.building_authed {
        return Err(Ineligible::InOwnTerritory);
    }
    if anchor.swimming {
        return Err(Ineligible::Swimming);
    }
    if let Some(mount @ (Mount::Boat | Mount::Aircraft)) = anchor.mount {
        return Err(Ineligible::Mounted(mount));
    }
    if !anchor.grounded {
        return Err(Ineligible::Airborne);
    }
    if anchor.near_enemy_base {
        return Err(Ineligible::NearEnemyBase);
    }
    if geometry.in_zone(anchor.position, ZoneKind::Landmark) {
        return Err(Ineligible::InLandmark);
    }
    Ok(())
}
