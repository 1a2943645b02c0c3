//! In-memory host world.
//!
//! A terrain grid plus an entity table that implements every host trait the
//! spawner needs. Bounding volumes are checked as axis-aligned boxes, which
//! is conservative for rotated objects.

mod terrain;

pub use terrain::{Cell, CellKind, Terrain};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use glam::Vec3;
use rand::Rng;

use crate::anchor::{Anchor, AnchorSource};
use crate::config::Config;
use crate::entity::{EntityFactory, EntityId, Inventory, ItemStack, Posture, SkinId};
use crate::geometry::{
    Collider, GeometryProvider, GroundHit, Layer, LayerMask, OrientedBox, Pose, Shape, ZoneKind,
};
use crate::notify::{Delivery, MessageKey, Messages, Notifier};

const DOOR_TEMPLATE: &str = "door.hinged";

/// How the sandbox builds a template
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blueprint {
    pub half_extents: Vec3,
    /// `None` for objects without a collider
    pub layer: Option<Layer>,
    pub capacity: Option<usize>,
    pub has_door: bool,
}

impl Blueprint {
    fn solid(half_extents: Vec3, layer: Layer) -> Self {
        Self {
            half_extents,
            layer: Some(layer),
            capacity: None,
            has_door: false,
        }
    }

    fn storage(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// One object in the sandbox world
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxEntity {
    pub id: EntityId,
    pub template: String,
    pub pose: Pose,
    pub blueprint: Blueprint,
    pub skin: SkinId,
    pub parent: Option<EntityId>,
    pub health: Option<f32>,
    pub posture: Option<Posture>,
    /// Owner of the lock on a door, 0 = system
    pub lock_owner: Option<u64>,
    pub authorized: bool,
    pub contents: Vec<ItemStack>,
    pub weapon: Option<(String, ItemStack)>,
}

impl SandboxEntity {
    pub fn bounds(&self) -> OrientedBox {
        bounds_at(&self.blueprint, self.pose)
    }
}

fn bounds_at(blueprint: &Blueprint, pose: Pose) -> OrientedBox {
    let lift = pose.rotation * Vec3::new(0.0, blueprint.half_extents.y, 0.0);
    OrientedBox::new(pose.position + lift, blueprint.half_extents, pose.rotation)
}

/// A message the sandbox delivered
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: Option<EntityId>,
    pub key: MessageKey,
    pub delivery: Delivery,
    pub text: String,
}

struct World {
    next_id: u64,
    entities: BTreeMap<EntityId, SandboxEntity>,
    anchors: Vec<Anchor>,
    messages: Vec<SentMessage>,
}

impl World {
    fn spawn(&mut self, template: &str, pose: Pose, blueprint: Blueprint, parent: Option<EntityId>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(
            id,
            SandboxEntity {
                id,
                template: template.to_string(),
                pose,
                blueprint,
                skin: 0,
                parent,
                health: None,
                posture: None,
                lock_owner: None,
                authorized: true,
                contents: Vec::new(),
                weapon: None,
            },
        );
        id
    }
}

/// In-memory implementation of every host trait
pub struct Sandbox {
    terrain: Terrain,
    templates: HashMap<String, Blueprint>,
    items: Mutex<HashSet<String>>,
    texts: Messages,
    world: Mutex<World>,
}

impl Sandbox {
    pub fn new(terrain: Terrain) -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "shelter.wood".to_string(),
            Blueprint {
                has_door: true,
                ..Blueprint::solid(Vec3::new(2.2, 1.6, 2.2), Layer::Construction)
            },
        );
        templates.insert(
            DOOR_TEMPLATE.to_string(),
            Blueprint {
                half_extents: Vec3::new(0.5, 1.0, 0.05),
                layer: None,
                capacity: None,
                has_door: false,
            },
        );
        templates.insert(
            "box.wooden".to_string(),
            Blueprint::solid(Vec3::new(0.35, 0.3, 0.25), Layer::Deployed).storage(12),
        );
        templates.insert(
            "furnace".to_string(),
            Blueprint::solid(Vec3::new(0.45, 0.6, 0.45), Layer::Deployed).storage(6),
        );
        templates.insert(
            "crate.large".to_string(),
            Blueprint::solid(Vec3::new(3.0, 1.0, 3.0), Layer::Deployed).storage(48),
        );
        templates.insert(
            "landmine".to_string(),
            Blueprint::solid(Vec3::new(0.2, 0.05, 0.2), Layer::Deployed),
        );
        templates.insert(
            "sentry.turret".to_string(),
            Blueprint::solid(Vec3::new(0.4, 0.6, 0.4), Layer::Deployed).storage(5),
        );

        let defaults = Config::default();
        let mut items: HashSet<String> = defaults
            .loot
            .items
            .iter()
            .map(|i| i.template.clone())
            .collect();
        items.insert(defaults.defense.weapon.clone());
        items.insert(defaults.defense.ammo.template.clone());
        items.insert("ammo.rifle.hv".to_string());

        Self {
            terrain,
            templates,
            items: Mutex::new(items),
            texts: Messages::default(),
            world: Mutex::new(World {
                next_id: 1000,
                entities: BTreeMap::new(),
                anchors: Vec::new(),
                messages: Vec::new(),
            }),
        }
    }

    /// 256x256 plains at one height
    pub fn flat(elevation: f32) -> Self {
        Self::new(Terrain::uniform(64, 64, 4.0, elevation, CellKind::Plains))
    }

    /// Random terrain of `width` x `depth` cells
    pub fn generated<R: Rng + ?Sized>(rng: &mut R, width: usize, depth: usize) -> Self {
        Self::new(Terrain::generate(rng, width, depth, 4.0))
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn register_template(&mut self, name: &str, blueprint: Blueprint) {
        self.templates.insert(name.to_string(), blueprint);
    }

    pub fn forget_item(&self, template: &str) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(template);
    }

    pub fn add_anchor(&self, anchor: Anchor) {
        self.world().anchors.push(anchor);
    }

    /// Change a live anchor in place, as the host would between ticks
    pub fn update_anchor(&self, id: EntityId, f: impl FnOnce(&mut Anchor)) {
        if let Some(anchor) = self.world().anchors.iter_mut().find(|a| a.id == id) {
            f(anchor);
        }
    }

    pub fn remove_anchor(&self, id: EntityId) {
        self.world().anchors.retain(|a| a.id != id);
    }

    pub fn entity(&self, id: EntityId) -> Option<SandboxEntity> {
        self.world().entities.get(&id).cloned()
    }

    pub fn world_bounds(&self, id: EntityId) -> Option<OrientedBox> {
        self.world().entities.get(&id).map(SandboxEntity::bounds)
    }

    /// Ids of live objects built from `template`, oldest first
    pub fn with_template(&self, template: &str) -> Vec<EntityId> {
        self.world()
            .entities
            .values()
            .filter(|e| e.template == template)
            .map(|e| e.id)
            .collect()
    }

    /// Live objects, anchors excluded
    pub fn live_count(&self) -> usize {
        self.world().entities.len()
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.world().messages.clone()
    }

    fn update(&self, id: EntityId, f: impl FnOnce(&mut SandboxEntity)) {
        if let Some(entity) = self.world().entities.get_mut(&id) {
            f(entity);
        }
    }

    fn colliders(&self, shape: &Shape, mask: LayerMask) -> Vec<Collider> {
        let (min, max) = shape_aabb(shape);
        let mut hits = Vec::new();

        if mask.contains(Layer::Terrain) {
            let center = (min + max) * 0.5;
            if self.terrain.cell_at(center).is_some() && min.y <= self.terrain.height_at(center) + 0.01 {
                hits.push(Collider {
                    owner: None,
                    layer: Layer::Terrain,
                });
            }
        }

        for (layer, kind) in [
            (Layer::World, CellKind::Rock),
            (Layer::PreventBuilding, CellKind::Landmark),
        ] {
            if mask.contains(layer) && self.terrain.cells_in(min, max).any(|c| c.kind == kind) {
                hits.push(Collider { owner: None, layer });
            }
        }

        let world = self.world();
        for entity in world.entities.values() {
            let Some(layer) = entity.blueprint.layer else {
                continue;
            };
            if !mask.contains(layer) {
                continue;
            }
            let (e_min, e_max) = entity.bounds().aabb();
            let touching = match shape {
                Shape::Sphere { center, radius } => {
                    center.clamp(e_min, e_max).distance(*center) <= *radius
                }
                Shape::Box(_) => aabb_overlap(min, max, e_min, e_max),
            };
            if touching {
                hits.push(Collider {
                    owner: Some(entity.id),
                    layer,
                });
            }
        }

        if mask.contains(Layer::Actor) {
            for anchor in &world.anchors {
                let inside = match shape {
                    Shape::Sphere { center, radius } => anchor.position.distance(*center) <= *radius,
                    Shape::Box(_) => {
                        anchor.position.cmpge(min).all() && anchor.position.cmple(max).all()
                    }
                };
                if inside {
                    hits.push(Collider {
                        owner: Some(anchor.id),
                        layer: Layer::Actor,
                    });
                }
            }
        }

        hits
    }
}

fn shape_aabb(shape: &Shape) -> (Vec3, Vec3) {
    match shape {
        Shape::Sphere { center, radius } => (*center - Vec3::splat(*radius), *center + Vec3::splat(*radius)),
        Shape::Box(b) => b.aabb(),
    }
}

fn aabb_overlap(a_min: Vec3, a_max: Vec3, b_min: Vec3, b_max: Vec3) -> bool {
    a_min.cmple(b_max).all() && b_min.cmple(a_max).all()
}

impl GeometryProvider for Sandbox {
    fn height_at(&self, point: Vec3) -> f32 {
        self.terrain.height_at(point)
    }

    fn ground_probe(&self, point: Vec3, max_range: f32, mask: LayerMask) -> Option<GroundHit> {
        if !mask.contains(Layer::Terrain) {
            return None;
        }
        let ground = self.terrain.cell_at(point)?.elevation;
        if (point.y - ground).abs() > max_range {
            return None;
        }
        Some(GroundHit {
            point: Vec3::new(point.x, ground, point.z),
            normal: Vec3::Y,
        })
    }

    fn overlap(&self, shape: &Shape, mask: LayerMask) -> Vec<Collider> {
        self.colliders(shape, mask)
    }

    fn in_zone(&self, point: Vec3, zone: ZoneKind) -> bool {
        let Some(cell) = self.terrain.cell_at(point) else {
            // open sea around the map
            return zone == ZoneKind::Water;
        };
        matches!(
            (zone, cell.kind),
            (ZoneKind::Landmark, CellKind::Landmark)
                | (ZoneKind::NoBuild, CellKind::NoBuild)
                | (ZoneKind::Water, CellKind::Water)
                | (ZoneKind::Road, CellKind::Road)
                | (ZoneKind::Rail, CellKind::Rail)
        )
    }
}

impl EntityFactory for Sandbox {
    fn create(&self, template: &str, pose: Pose) -> Option<EntityId> {
        let blueprint = *self.templates.get(template)?;
        let door_blueprint = self.templates.get(DOOR_TEMPLATE).copied();

        let mut world = self.world();
        let id = world.spawn(template, pose, blueprint, None);
        if let (true, Some(door_blueprint)) = (blueprint.has_door, door_blueprint) {
            let door = world.spawn(DOOR_TEMPLATE, pose, door_blueprint, Some(id));
            if let Some(d) = world.entities.get_mut(&door) {
                // placed by whoever built the shell
                d.lock_owner = Some(1);
            }
        }
        Some(id)
    }

    fn destroy(&self, id: EntityId) {
        let mut world = self.world();
        let mut doomed = vec![id];
        while let Some(next) = doomed.pop() {
            if world.entities.remove(&next).is_some() {
                doomed.extend(
                    world
                        .entities
                        .values()
                        .filter(|e| e.parent == Some(next))
                        .map(|e| e.id),
                );
            }
        }
    }

    fn exists(&self, id: EntityId) -> bool {
        self.world().entities.contains_key(&id)
    }

    fn bounds(&self, template: &str, pose: Pose) -> Option<OrientedBox> {
        self.templates.get(template).map(|blueprint| bounds_at(blueprint, pose))
    }

    fn set_skin(&self, id: EntityId, skin: SkinId) {
        self.update(id, |e| e.skin = skin);
    }

    fn set_parent(&self, child: EntityId, parent: EntityId) {
        self.update(child, |e| e.parent = Some(parent));
    }

    fn set_health(&self, id: EntityId, health: f32) {
        self.update(id, |e| e.health = Some(health));
    }

    fn clear_authorizations(&self, id: EntityId) {
        self.update(id, |e| e.authorized = false);
    }

    fn door_of(&self, structure: EntityId) -> Option<EntityId> {
        self.world()
            .entities
            .values()
            .find(|e| e.parent == Some(structure) && e.template == DOOR_TEMPLATE)
            .map(|e| e.id)
    }

    fn reset_lock_owner(&self, door: EntityId) {
        self.update(door, |e| e.lock_owner = Some(0));
    }

    fn set_posture(&self, id: EntityId, posture: Posture) {
        self.update(id, |e| e.posture = Some(posture));
    }
}

impl Inventory for Sandbox {
    fn item_exists(&self, template: &str) -> bool {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(template)
    }

    fn capacity(&self, container: EntityId) -> Option<usize> {
        self.world().entities.get(&container)?.blueprint.capacity
    }

    fn free_slots(&self, container: EntityId) -> usize {
        self.world()
            .entities
            .get(&container)
            .and_then(|e| e.blueprint.capacity.map(|cap| cap.saturating_sub(e.contents.len())))
            .unwrap_or(0)
    }

    fn insert(&self, container: EntityId, stack: ItemStack) -> bool {
        if !self.item_exists(&stack.template) {
            return false;
        }
        let mut world = self.world();
        let Some(entity) = world.entities.get_mut(&container) else {
            return false;
        };
        match entity.blueprint.capacity {
            Some(cap) if entity.contents.len() < cap => {
                entity.contents.push(stack);
                true
            }
            _ => false,
        }
    }

    fn load_weapon(&self, holder: EntityId, weapon: &str, ammo: ItemStack) -> bool {
        if !self.item_exists(weapon) || !self.item_exists(&ammo.template) {
            return false;
        }
        let mut world = self.world();
        let Some(entity) = world.entities.get_mut(&holder) else {
            return false;
        };
        entity.weapon = Some((weapon.to_string(), ammo));
        true
    }
}

impl AnchorSource for Sandbox {
    fn live_anchors(&self) -> Vec<Anchor> {
        self.world().anchors.clone()
    }

    fn anchor(&self, id: EntityId) -> Option<Anchor> {
        self.world().anchors.iter().find(|a| a.id == id).cloned()
    }
}

impl Notifier for Sandbox {
    fn notify(&self, recipient: EntityId, key: MessageKey, delivery: Delivery) {
        let text = self.texts.text("en", key).to_string();
        self.world().messages.push(SentMessage {
            recipient: Some(recipient),
            key,
            delivery,
            text,
        });
    }

    fn broadcast(&self, point: Vec3, radius: f32, key: MessageKey, delivery: Delivery) {
        let text = self.texts.text("en", key).to_string();
        let mut world = self.world();
        let recipients: Vec<EntityId> = world
            .anchors
            .iter()
            .filter(|a| a.position.distance(point) <= radius)
            .map(|a| a.id)
            .collect();
        for recipient in recipients {
            world.messages.push(SentMessage {
                recipient: Some(recipient),
                key,
                delivery,
                text: text.clone(),
            });
        }
    }
}
