//! Finding a spot for a new camp near an anchor.
//!
//! Rejection sampling: draw a candidate in the search annulus, throw it away
//! on the first failed rule, and stop at the first survivor that also has
//! ground under it. An exhausted search is an ordinary `None`.

use glam::Vec3;
use rand::Rng;
use tracing::{debug, trace};

use crate::config::SearchConfig;
use crate::geometry::{
    GeometryProvider, LayerMask, Pose, Shape, ZoneKind, annulus_point, random_yaw,
    surface_rotation,
};

/// Why a candidate point was thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InsideRock,
    InLandmark,
    Crowded,
    Submerged,
    OnRoadOrRail,
    OffGround,
    NoBuildZone,
}

/// The predicate set a camp position has to pass
pub struct PlacementRules<'a> {
    geometry: &'a dyn GeometryProvider,
    search: &'a SearchConfig,
}

impl<'a> PlacementRules<'a> {
    pub fn new(geometry: &'a dyn GeometryProvider, search: &'a SearchConfig) -> Self {
        Self { geometry, search }
    }

    /// First rule `point` breaks, if any
    pub fn check(&self, point: Vec3) -> Result<(), Rejection> {
        let geo = self.geometry;
        let s = self.search;

        if !geo.overlap(&sphere(point, s.rock_avoidance_radius), LayerMask::WORLD).is_empty() {
            return Err(Rejection::InsideRock);
        }
        if geo.in_zone(point, ZoneKind::Landmark) {
            return Err(Rejection::InLandmark);
        }
        let nearby = sphere(point, s.entity_avoidance_radius);
        if geo
            .overlap(&nearby, LayerMask::ENTITIES)
            .iter()
            .any(|c| c.owner.is_some())
        {
            return Err(Rejection::Crowded);
        }
        if !geo.overlap(&nearby, LayerMask::ACTORS).is_empty() {
            return Err(Rejection::Crowded);
        }
        if geo.in_zone(point, ZoneKind::Water) {
            return Err(Rejection::Submerged);
        }
        if geo.in_zone(point, ZoneKind::Road) || geo.in_zone(point, ZoneKind::Rail) {
            return Err(Rejection::OnRoadOrRail);
        }
        if geo.overlap(&sphere(point, s.ground_check_radius), LayerMask::TERRAIN).is_empty() {
            return Err(Rejection::OffGround);
        }
        if geo.in_zone(point, ZoneKind::NoBuild)
            || !geo
                .overlap(&sphere(point, s.no_build_distance), LayerMask::PREVENT_BUILDING)
                .is_empty()
        {
            return Err(Rejection::NoBuildZone);
        }
        Ok(())
    }
}

fn sphere(center: Vec3, radius: f32) -> Shape {
    Shape::Sphere { center, radius }
}

/// Search for a valid camp pose around `anchor`.
///
/// Returns the probed ground contact with a surface-aligned, randomly yawed
/// rotation, or `None` after `search.attempts` candidates.
pub fn find_spawn_point<R: Rng + ?Sized>(
    rng: &mut R,
    geometry: &dyn GeometryProvider,
    search: &SearchConfig,
    anchor: Vec3,
) -> Option<Pose> {
    let rules = PlacementRules::new(geometry, search);

    for attempt in 0..search.attempts {
        let candidate = annulus_point(rng, geometry, anchor, search.min_radius, search.max_radius);

        if let Err(reason) = rules.check(candidate) {
            trace!("Candidate {} at {:?} rejected: {:?}", attempt, candidate, reason);
            continue;
        }

        let Some(hit) = geometry.ground_probe(candidate, search.ground_probe_range, LayerMask::TERRAIN)
        else {
            trace!("Candidate {} at {:?} has no ground under it", attempt, candidate);
            continue;
        };

        let rotation = surface_rotation(hit.normal, random_yaw(rng));
        debug!("Found camp position {:?} after {} attempts", hit.point, attempt + 1);
        return Some(Pose::new(hit.point, rotation));
    }

    debug!("No camp position near {:?} after {} attempts", anchor, search.attempts);
    None
}
