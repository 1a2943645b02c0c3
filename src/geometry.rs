//! Spatial primitives and the geometry provider seam.
//!
//! The crate never does physics itself. Height sampling, ground probes,
//! overlap queries and zone membership all come from a host-supplied
//! [`GeometryProvider`]; this module only defines the vocabulary and the
//! sampling helpers shared by structure and interior placement.

use std::f32::consts::TAU;
use std::ops::BitOr;

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Position plus orientation in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose with identity rotation
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Compose a pose expressed relative to `self` into world space
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * local.position,
            rotation: self.rotation * local.rotation,
        }
    }
}

/// Box with arbitrary orientation, used for fit-checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

impl OrientedBox {
    pub fn new(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        Self {
            center,
            half_extents,
            rotation,
        }
    }

    /// The eight world-space corners
    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sign = Vec3::new(
                if i & 4 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 1 == 0 { -1.0 } else { 1.0 },
            );
            *corner = self.center + self.rotation * (sign * self.half_extents);
        }
        corners
    }

    /// Axis-aligned bounds enclosing the box, as (min, max)
    pub fn aabb(&self) -> (Vec3, Vec3) {
        let corners = self.corners();
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.min(*c);
            max = max.max(*c);
        }
        (min, max)
    }
}

/// Query volume for overlap checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    Box(OrientedBox),
}

/// Collision layers the host sorts its colliders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Heightmap terrain
    Terrain,
    /// Static world geometry: rocks, cliffs, formations
    World,
    /// Player-deployed objects (boxes, furnaces, traps)
    Deployed,
    /// Building blocks
    Construction,
    /// Live actors
    Actor,
    /// Volumes where building is forbidden
    PreventBuilding,
}

impl Layer {
    const fn bit(self) -> u32 {
        match self {
            Layer::Terrain => 1 << 0,
            Layer::World => 1 << 1,
            Layer::Deployed => 1 << 2,
            Layer::Construction => 1 << 3,
            Layer::Actor => 1 << 4,
            Layer::PreventBuilding => 1 << 5,
        }
    }
}

/// Set of layers a query should consider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const TERRAIN: LayerMask = LayerMask(Layer::Terrain.bit());
    pub const WORLD: LayerMask = LayerMask(Layer::World.bit());
    pub const ACTORS: LayerMask = LayerMask(Layer::Actor.bit());
    pub const PREVENT_BUILDING: LayerMask = LayerMask(Layer::PreventBuilding.bit());
    /// Deployed objects and construction
    pub const ENTITIES: LayerMask = LayerMask(Layer::Deployed.bit() | Layer::Construction.bit());

    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }
}

impl From<Layer> for LayerMask {
    fn from(layer: Layer) -> Self {
        LayerMask(layer.bit())
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: Self) -> Self {
        LayerMask(self.0 | rhs.0)
    }
}

/// Zone categories the host can answer membership for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Monuments and other restricted landmarks
    Landmark,
    NoBuild,
    Water,
    Road,
    Rail,
}

/// One collider returned by an overlap query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collider {
    /// Owning entity, `None` for static world geometry
    pub owner: Option<EntityId>,
    pub layer: Layer,
}

/// Result of a downward ground probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundHit {
    pub point: Vec3,
    pub normal: Vec3,
}

/// Host-provided spatial queries
pub trait GeometryProvider: Send + Sync {
    /// Terrain height under `point` (its y is ignored)
    fn height_at(&self, point: Vec3) -> f32;

    /// Probe straight down from `max_range` above `point` to `max_range` below
    fn ground_probe(&self, point: Vec3, max_range: f32, mask: LayerMask) -> Option<GroundHit>;

    /// All colliders on `mask` layers intersecting `shape`
    fn overlap(&self, shape: &Shape, mask: LayerMask) -> Vec<Collider>;

    fn in_zone(&self, point: Vec3, zone: ZoneKind) -> bool;
}

/// Uniformly distributed direction
pub fn random_on_unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), z, r * theta.sin())
}

/// Random point around `center`: uniform direction, uniform distance in
/// `[min_radius, max_radius]`, then dropped onto the terrain height.
pub fn annulus_point<R: Rng + ?Sized>(
    rng: &mut R,
    geometry: &dyn GeometryProvider,
    center: Vec3,
    min_radius: f32,
    max_radius: f32,
) -> Vec3 {
    let direction = random_on_unit_sphere(rng);
    let distance = if max_radius > min_radius {
        rng.gen_range(min_radius..max_radius)
    } else {
        min_radius
    };
    let mut point = center + direction * distance;
    point.y = geometry.height_at(point);
    point
}

/// Uniform yaw in whole degrees, `[0, 360)`
pub fn random_yaw<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(0u16..360) as f32
}

/// Rotation that tilts local up onto `normal`, then spins by `yaw_degrees`
pub fn surface_rotation(normal: Vec3, yaw_degrees: f32) -> Quat {
    let up = normal.try_normalize().unwrap_or(Vec3::Y);
    Quat::from_rotation_arc(Vec3::Y, up) * Quat::from_rotation_y(yaw_degrees.to_radians())
}
