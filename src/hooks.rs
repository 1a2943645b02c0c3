//! Extension points other plugins can register.

use crate::entity::EntityId;
use crate::geometry::Pose;

/// Answer of a pre-spawn veto hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    Allow,
    Deny,
}

/// Callbacks invoked synchronously while a camp is furnished.
///
/// Both methods default to no-ops, so an empty impl (or [`NoHooks`]) means
/// every interior object is allowed.
pub trait SpawnHooks: Send + Sync {
    /// Called after a pose passed its fit-check, before the object exists
    fn pre_spawn(&self, _structure: EntityId, _template: &str, _pose: &Pose) -> Verdict {
        Verdict::Allow
    }

    /// Called once the object is created and recorded
    fn post_spawn(&self, _structure: EntityId, _object: EntityId) {}
}

/// No registered hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SpawnHooks for NoHooks {}
