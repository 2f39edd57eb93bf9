//! Space management: which space the player is in, which actors are
//! materialized there, and the transition procedure between spaces.
//!
//! The home space (the player's own island, id 1) is special: leaving it
//! hides its actors instead of destroying them, so returning home restores
//! the world without a replay. Every other space is torn down on exit and
//! rebuilt from the [`ChunkCache`] on entry.

use crate::chunks::ChunkCache;
use crate::render::Renderer;
use crate::types::{BlockPos, EntityRef, ItemCode, SpaceKey, SpawnType, Vec3};
use std::collections::HashMap;
use std::sync::Arc;

/// Where the player lands in a space with terrain, absent a saved position.
pub const DEFAULT_OUTDOOR_SPAWN: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: 2.0,
};

/// Where the player lands in a chunkless (interior) space.
pub const DEFAULT_BUILDING_SPAWN: Vec3 = Vec3 {
    x: 0.0,
    y: -2.0,
    z: 1.0,
};

/// One materialized visual object and what it represents.
#[derive(Debug, Clone, Copy)]
struct Actor {
    entity: EntityRef,
    item: ItemCode,
    spawn_type: SpawnType,
    hidden: bool,
}

pub struct SpaceManager {
    renderer: Arc<dyn Renderer>,
    player: String,
    current: SpaceKey,
    /// Actors per space. Only the current space and the (possibly hidden)
    /// home space carry entries; other spaces are dropped on exit.
    actors: HashMap<SpaceKey, HashMap<BlockPos, Actor>>,
    /// Placeholder structure shown in a chunkless space.
    placeholder: Option<EntityRef>,
    /// Last player position per space, restored on re-entry.
    saved_positions: HashMap<SpaceKey, Vec3>,
}

impl SpaceManager {
    pub fn new(renderer: Arc<dyn Renderer>, player: impl Into<String>) -> Self {
        let player = player.into();
        let home = SpaceKey::new(player.clone(), 1);
        Self {
            renderer,
            player,
            current: home,
            actors: HashMap::new(),
            placeholder: None,
            saved_positions: HashMap::new(),
        }
    }

    pub fn current_space(&self) -> &SpaceKey {
        &self.current
    }

    pub fn is_home(&self) -> bool {
        self.current.is_home_of(&self.player)
    }

    // -----------------------------------------------------------------------
    // Actor map
    // -----------------------------------------------------------------------

    pub fn entity_at(&self, position: BlockPos) -> Option<EntityRef> {
        self.actors
            .get(&self.current)?
            .get(&position)
            .map(|a| a.entity)
    }

    pub fn item_at(&self, position: BlockPos) -> Option<ItemCode> {
        self.actors
            .get(&self.current)?
            .get(&position)
            .map(|a| a.item)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.get(&self.current).map_or(0, |m| m.len())
    }

    /// Materialize `item` at `position` in the current space.
    ///
    /// Idempotent per cell: an existing actor with the same item is kept
    /// (and unhidden if needed) rather than respawned, so replaying an
    /// already-applied update costs nothing. `ItemCode::NONE` clears the
    /// cell.
    pub fn materialize_at(&mut self, position: BlockPos, item: ItemCode, spawn_type: SpawnType) {
        if item.is_none() {
            self.remove_at(position);
            return;
        }

        let map = self.actors.entry(self.current.clone()).or_default();
        if let Some(actor) = map.get_mut(&position) {
            if actor.item == item {
                if actor.hidden {
                    self.renderer.set_visibility(actor.entity, true, true);
                    actor.hidden = false;
                }
                return;
            }
            self.renderer.destroy(actor.entity);
        }
        let entity = self.renderer.materialize(position, item, spawn_type);
        map.insert(
            position,
            Actor {
                entity,
                item,
                spawn_type,
                hidden: false,
            },
        );
    }

    /// Take ownership of an entity someone else already spawned (a promoted
    /// optimistic placement), replacing any existing actor at the cell.
    pub fn adopt(
        &mut self,
        position: BlockPos,
        entity: EntityRef,
        item: ItemCode,
        spawn_type: SpawnType,
    ) {
        let map = self.actors.entry(self.current.clone()).or_default();
        if let Some(old) = map.insert(
            position,
            Actor {
                entity,
                item,
                spawn_type,
                hidden: false,
            },
        ) {
            if old.entity != entity {
                self.renderer.destroy(old.entity);
            }
        }
    }

    /// Drop the actor at `position` without touching its entity. Used when
    /// the optimistic tracker has already torn the entity down.
    pub fn forget_at(&mut self, position: BlockPos) {
        if let Some(map) = self.actors.get_mut(&self.current) {
            map.remove(&position);
        }
    }

    /// Destroy and forget the actor at `position`, if any.
    pub fn remove_at(&mut self, position: BlockPos) {
        if let Some(map) = self.actors.get_mut(&self.current) {
            if let Some(actor) = map.remove(&position) {
                self.renderer.destroy(actor.entity);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Move the player to `target`, tearing down or hiding the current
    /// space and rebuilding the target from the cache.
    pub fn transition_to(&mut self, target: SpaceKey, cache: &ChunkCache) {
        if target == self.current {
            return;
        }
        log::info!("space transition {} -> {}", self.current, target);

        self.saved_positions
            .insert(self.current.clone(), self.renderer.player_position());
        self.leave_current();

        self.current = target.clone();
        let restored = self.restore_home_actors();
        if !restored {
            if cache.has_chunks(&target) {
                for spawn in cache.replay(&target, None) {
                    self.materialize_at(spawn.position, spawn.item, spawn.spawn_type);
                }
            } else {
                self.placeholder = Some(self.renderer.spawn_placeholder());
            }
        }

        let spawn_point = self
            .saved_positions
            .get(&target)
            .copied()
            .unwrap_or(if cache.has_chunks(&target) {
                DEFAULT_OUTDOOR_SPAWN
            } else {
                DEFAULT_BUILDING_SPAWN
            });
        self.renderer.teleport_player(spawn_point);
    }

    /// Hide home, destroy anything else.
    fn leave_current(&mut self) {
        if let Some(entity) = self.placeholder.take() {
            self.renderer.destroy(entity);
        }
        if self.is_home() {
            if let Some(map) = self.actors.get_mut(&self.current) {
                for actor in map.values_mut() {
                    if !actor.hidden {
                        self.renderer.set_visibility(actor.entity, false, false);
                        actor.hidden = true;
                    }
                }
            }
        } else if let Some(map) = self.actors.remove(&self.current) {
            for actor in map.values() {
                self.renderer.destroy(actor.entity);
            }
        }
    }

    /// Returning home with hidden actors restores them in place. Returns
    /// whether a restore happened.
    fn restore_home_actors(&mut self) -> bool {
        if !self.is_home() {
            return false;
        }
        let Some(map) = self.actors.get_mut(&self.current) else {
            return false;
        };
        if map.is_empty() {
            return false;
        }
        for actor in map.values_mut() {
            if actor.hidden {
                self.renderer.set_visibility(actor.entity, true, true);
                actor.hidden = false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
