//! Rendering/engine collaborator boundary.
//!
//! The bridge never spawns or destroys visual objects itself; it asks this
//! trait. Implementations live in the engine layer (or in tests, which
//! record the calls instead of drawing anything).

use crate::types::{BlockPos, EntityRef, ItemCode, SpawnType, Vec3};

pub trait Renderer: Send + Sync {
    /// Create the visual object for `item` at `position`. Returns a handle
    /// the bridge passes back for later destroy/visibility calls.
    fn materialize(&self, position: BlockPos, item: ItemCode, spawn_type: SpawnType) -> EntityRef;

    fn destroy(&self, entity: EntityRef);

    fn set_visibility(&self, entity: EntityRef, visible: bool, collidable: bool);

    /// Mark an entity as speculative (unconfirmed on chain).
    fn apply_pending_tint(&self, entity: EntityRef);

    /// Restore normal appearance once the chain confirms.
    fn clear_pending_tint(&self, entity: EntityRef);

    /// Spawn the placeholder structure shown in a space with no voxel chunks.
    fn spawn_placeholder(&self) -> EntityRef;

    fn teleport_player(&self, position: Vec3);

    fn player_position(&self) -> Vec3;
}

// ---------------------------------------------------------------------------
// Null renderer
// ---------------------------------------------------------------------------

/// Headless implementation: hands out sequential entity ids and logs.
/// Used by the loopback simulator binary.
#[derive(Debug, Default)]
pub struct NullRenderer {
    next_id: std::sync::atomic::AtomicU64,
}

impl Renderer for NullRenderer {
    fn materialize(&self, position: BlockPos, item: ItemCode, spawn_type: SpawnType) -> EntityRef {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        log::debug!("materialize {} {} {:?} -> #{}", item, position, spawn_type, id);
        EntityRef(id)
    }

    fn destroy(&self, entity: EntityRef) {
        log::debug!("destroy #{}", entity.0);
    }

    fn set_visibility(&self, entity: EntityRef, visible: bool, collidable: bool) {
        log::debug!("visibility #{} -> {}/{}", entity.0, visible, collidable);
    }

    fn apply_pending_tint(&self, _entity: EntityRef) {}

    fn clear_pending_tint(&self, _entity: EntityRef) {}

    fn spawn_placeholder(&self) -> EntityRef {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        log::debug!("placeholder structure -> #{}", id);
        EntityRef(id)
    }

    fn teleport_player(&self, position: Vec3) {
        log::debug!("teleport player to {}", position);
    }

    fn player_position(&self) -> Vec3 {
        Vec3::zero()
    }
}
