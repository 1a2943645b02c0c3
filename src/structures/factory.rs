//! Creating the camp shell and resetting its fixtures.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::StructureConfig;
use crate::entity::{EntityFactory, EntityId};
use crate::geometry::Pose;

/// Spawns the structure itself
pub struct StructureFactory<'a> {
    entities: &'a dyn EntityFactory,
}

impl<'a> StructureFactory<'a> {
    pub fn new(entities: &'a dyn EntityFactory) -> Self {
        Self { entities }
    }

    /// Create the shell at `pose` and put its fixtures in a raidable state.
    ///
    /// The door lock goes to the system owner, the authorization list is
    /// emptied and the door may get a random skin. `None` when the host
    /// could not create the template.
    pub fn build<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        config: &StructureConfig,
        pose: Pose,
    ) -> Option<EntityId> {
        let Some(id) = self.entities.create(&config.template, pose) else {
            warn!("Failed to create structure '{}'", config.template);
            return None;
        };

        if let Some(health) = config.health {
            self.entities.set_health(id, health);
        }
        self.entities.clear_authorizations(id);

        match self.entities.door_of(id) {
            Some(door) => {
                self.entities.reset_lock_owner(door);
                if let Some(&skin) = config.skin_ids.choose(rng) {
                    self.entities.set_skin(door, skin);
                }
            }
            None => debug!("Structure {} has no door", id),
        }

        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Posture, SkinId};
    use crate::geometry::OrientedBox;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        calls: Mutex<Vec<String>>,
        refuse: bool,
    }

    impl Log {
        fn push(&self, s: String) {
            self.calls.lock().unwrap().push(s);
        }
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl EntityFactory for Log {
        fn create(&self, template: &str, _pose: Pose) -> Option<EntityId> {
            self.push(format!("create {template}"));
            (!self.refuse).then_some(EntityId(10))
        }
        fn destroy(&self, id: EntityId) {
            self.push(format!("destroy {id}"));
        }
        fn exists(&self, _id: EntityId) -> bool {
            true
        }
        fn bounds(&self, _template: &str, _pose: Pose) -> Option<OrientedBox> {
            None
        }
        fn set_skin(&self, id: EntityId, skin: SkinId) {
            self.push(format!("skin {id} {skin}"));
        }
        fn set_parent(&self, _child: EntityId, _parent: EntityId) {}
        fn set_health(&self, id: EntityId, health: f32) {
            self.push(format!("health {id} {health}"));
        }
        fn clear_authorizations(&self, id: EntityId) {
            self.push(format!("deauth {id}"));
        }
        fn door_of(&self, _structure: EntityId) -> Option<EntityId> {
            Some(EntityId(11))
        }
        fn reset_lock_owner(&self, door: EntityId) {
            self.push(format!("lock {door}"));
        }
        fn set_posture(&self, _id: EntityId, _posture: Posture) {}
    }

    #[test]
    fn test_build_resets_fixtures() {
        let log = Log::default();
        let config = StructureConfig {
            health: Some(250.0),
            skin_ids: vec![42],
            ..StructureConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let id = StructureFactory::new(&log).build(&mut rng, &config, Pose::at(Vec3::ZERO));

        assert_eq!(id, Some(EntityId(10)));
        assert_eq!(
            log.calls(),
            vec![
                format!("create {}", config.template),
                "health #10 250".to_string(),
                "deauth #10".to_string(),
                "lock #11".to_string(),
                "skin #11 42".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_skin_when_list_empty() {
        let log = Log::default();
        let config = StructureConfig {
            skin_ids: Vec::new(),
            ..StructureConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        StructureFactory::new(&log).build(&mut rng, &config, Pose::at(Vec3::ZERO));
        assert!(!log.calls().iter().any(|c| c.starts_with("skin")));
    }

    #[test]
    fn test_failed_create_has_no_side_effects() {
        let log = Log {
            refuse: true,
            ..Log::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let id = StructureFactory::new(&log).build(&mut rng, &StructureConfig::default(), Pose::at(Vec3::ZERO));
        assert!(id.is_none());
        assert_eq!(log.calls().len(), 1);
    }
}
