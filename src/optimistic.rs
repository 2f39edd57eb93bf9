//! Optimistic local state: applies the expected effect of an action before
//! the chain confirms it, tracks the speculation per position, and rolls it
//! back on timeout or conflicting confirmation.
//!
//! Invariant: at most one pending entry per position — a second speculation
//! at the same position supersedes the first. Rollback never blocks and a
//! rollback that finds no entry is a no-op, not an error.

use crate::render::Renderer;
use crate::types::{BlockPos, EntityRef, ItemCode, SpawnType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of reconciling a confirmed world update against pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The speculation matched; the entity was promoted (tint cleared) and
    /// the caller should adopt it instead of re-materializing.
    Confirmed { entity: Option<EntityRef> },
    /// The speculation was wrong and has been discarded; normal
    /// materialization should proceed with the confirmed item.
    Superseded,
    /// Nothing was pending at this position.
    Untracked,
}

#[derive(Debug)]
struct OptimisticEntry {
    /// Speculative entity created for a placement, if any.
    entity: Option<EntityRef>,
    /// Pre-existing entity hidden for a speculative removal, if any.
    hidden: Option<EntityRef>,
    /// Item the chain is expected to confirm at this position.
    /// `ItemCode::NONE` means the block is expected to disappear.
    expected: ItemCode,
    created_at: Instant,
}

// ---------------------------------------------------------------------------
// Hotbar selection state
// ---------------------------------------------------------------------------

/// The locally selected hotbar slot, kept distinct from the last-known
/// server slot. Reads always prefer the local value; the selection is queued
/// for transmission lazily, just before the next dependent action, so rapid
/// scrolling costs at most one queued transaction for the winning slot.
#[derive(Debug)]
struct HotbarState {
    local_slot: u8,
    server_slot: u8,
    pending: bool,
    selected_at: Instant,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

pub struct OptimisticTracker {
    renderer: Arc<dyn Renderer>,
    entries: HashMap<BlockPos, OptimisticEntry>,
    timeout: Duration,
    hotbar_timeout: Duration,
    hotbar: HotbarState,
}

impl OptimisticTracker {
    pub fn new(renderer: Arc<dyn Renderer>, timeout: Duration, hotbar_timeout: Duration) -> Self {
        Self {
            renderer,
            entries: HashMap::new(),
            timeout,
            hotbar_timeout,
            hotbar: HotbarState {
                local_slot: 0,
                server_slot: 0,
                pending: false,
                selected_at: Instant::now(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Speculatively place `item` at `position`: materialize a tinted entity
    /// and remember what the chain is expected to confirm.
    pub fn apply_place(&mut self, position: BlockPos, item: ItemCode) -> EntityRef {
        self.discard(position);
        let entity = self
            .renderer
            .materialize(position, item, SpawnType::ChunkBlock);
        self.renderer.apply_pending_tint(entity);
        self.entries.insert(
            position,
            OptimisticEntry {
                entity: Some(entity),
                hidden: None,
                expected: item,
                created_at: Instant::now(),
            },
        );
        entity
    }

    /// Speculatively remove the block at `position`. The existing entity, if
    /// the caller knows one, is hidden (not destroyed) so a rollback can
    /// restore it untouched.
    pub fn apply_removal(&mut self, position: BlockPos, existing: Option<EntityRef>) {
        self.discard(position);
        if let Some(entity) = existing {
            self.renderer.set_visibility(entity, false, false);
        }
        self.entries.insert(
            position,
            OptimisticEntry {
                entity: None,
                hidden: existing,
                expected: ItemCode::NONE,
                created_at: Instant::now(),
            },
        );
    }

    // -----------------------------------------------------------------------
    // Reconcile
    // -----------------------------------------------------------------------

    /// A confirmed world update arrived for `position`.
    pub fn reconcile(&mut self, position: BlockPos, confirmed: ItemCode) -> Reconciliation {
        let Some(entry) = self.entries.remove(&position) else {
            return Reconciliation::Untracked;
        };

        if entry.expected == confirmed {
            if let Some(entity) = entry.entity {
                self.renderer.clear_pending_tint(entity);
            }
            if let Some(hidden) = entry.hidden {
                // Removal confirmed: the hidden entity is now stale.
                self.renderer.destroy(hidden);
            }
            log::debug!("optimistic {} at {} confirmed", confirmed, position);
            Reconciliation::Confirmed {
                entity: entry.entity,
            }
        } else {
            log::debug!(
                "optimistic mismatch at {}: expected {}, confirmed {}",
                position,
                entry.expected,
                confirmed
            );
            self.rollback_entry(entry);
            Reconciliation::Superseded
        }
    }

    // -----------------------------------------------------------------------
    // Sweep
    // -----------------------------------------------------------------------

    /// Roll back every pending entry whose age exceeds the timeout. Bounds
    /// the player-visible inconsistency window when a submission silently
    /// fails or its confirmation never arrives.
    pub fn sweep(&mut self, now: Instant) {
        let timeout = self.timeout;
        let expired: Vec<BlockPos> = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.created_at) > timeout)
            .map(|(pos, _)| *pos)
            .collect();
        for position in expired {
            log::warn!("optimistic entry at {} timed out, rolling back", position);
            self.discard(position);
        }

        if self.hotbar.pending && now.duration_since(self.hotbar.selected_at) > self.hotbar_timeout
        {
            self.hotbar.local_slot = self.hotbar.server_slot;
            self.hotbar.pending = false;
        }
    }

    /// Best-effort rollback; a missing entry is a no-op.
    pub fn discard(&mut self, position: BlockPos) {
        if let Some(entry) = self.entries.remove(&position) {
            self.rollback_entry(entry);
        }
    }

    fn rollback_entry(&mut self, entry: OptimisticEntry) {
        if let Some(entity) = entry.entity {
            self.renderer.destroy(entity);
        }
        if let Some(hidden) = entry.hidden {
            self.renderer.set_visibility(hidden, true, true);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_pending(&self, position: BlockPos) -> bool {
        self.entries.contains_key(&position)
    }

    // -----------------------------------------------------------------------
    // Hotbar
    // -----------------------------------------------------------------------

    /// UI selected a slot. Purely local until a dependent action needs it.
    pub fn select_local_slot(&mut self, slot: u8) {
        self.hotbar.local_slot = slot;
        self.hotbar.pending = slot != self.hotbar.server_slot;
        self.hotbar.selected_at = Instant::now();
    }

    /// Reads always prefer the local value.
    pub fn selected_slot(&self) -> u8 {
        self.hotbar.local_slot
    }

    /// Server confirmed a slot selection.
    pub fn server_slot_confirmed(&mut self, slot: u8) {
        self.hotbar.server_slot = slot;
        if !self.hotbar.pending {
            self.hotbar.local_slot = slot;
        } else if self.hotbar.local_slot == slot {
            self.hotbar.pending = false;
        }
    }

    /// The slot to transmit before the next dependent action, if the local
    /// selection has not been sent yet. Marks it sent.
    pub fn take_pending_slot(&mut self) -> Option<u8> {
        if self.hotbar.pending {
            self.hotbar.pending = false;
            Some(self.hotbar.local_slot)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use parking_lot::Mutex;
    use crate::types::Vec3;

    /// Records destroy/visibility traffic so rollbacks are observable.
    #[derive(Default)]
    struct RecordingRenderer {
        next_id: std::sync::atomic::AtomicU64,
        destroyed: Mutex<Vec<EntityRef>>,
        visibility: Mutex<Vec<(EntityRef, bool)>>,
        tint_cleared: Mutex<Vec<EntityRef>>,
    }

    impl Renderer for RecordingRenderer {
        fn materialize(&self, _p: BlockPos, _i: ItemCode, _s: SpawnType) -> EntityRef {
            EntityRef(
                self.next_id
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            )
        }
        fn destroy(&self, entity: EntityRef) {
            self.destroyed.lock().push(entity);
        }
        fn set_visibility(&self, entity: EntityRef, visible: bool, _collidable: bool) {
            self.visibility.lock().push((entity, visible));
        }
        fn apply_pending_tint(&self, _entity: EntityRef) {}
        fn clear_pending_tint(&self, entity: EntityRef) {
            self.tint_cleared.lock().push(entity);
        }
        fn spawn_placeholder(&self) -> EntityRef {
            EntityRef(u64::MAX)
        }
        fn teleport_player(&self, _position: Vec3) {}
        fn player_position(&self) -> Vec3 {
            Vec3::zero()
        }
    }

    fn make_tracker(renderer: Arc<RecordingRenderer>) -> OptimisticTracker {
        OptimisticTracker::new(renderer, Duration::from_secs(30), Duration::from_secs(2))
    }

    const POS: BlockPos = BlockPos { x: 8192, y: 8192, z: 0 };

    // ---------------------------------------------------------------
    // At-most-one entry per position
    // ---------------------------------------------------------------

    #[test]
    fn second_apply_supersedes_first() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());

        let first = tracker.apply_place(POS, ItemCode::GRASS);
        tracker.apply_place(POS, ItemCode::STONE);

        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(renderer.destroyed.lock().as_slice(), &[first]);
    }

    // ---------------------------------------------------------------
    // Confirm vs rollback
    // ---------------------------------------------------------------

    #[test]
    fn matching_confirmation_promotes_entity() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());

        let entity = tracker.apply_place(POS, ItemCode::DIRT);
        let outcome = tracker.reconcile(POS, ItemCode::DIRT);

        assert_eq!(
            outcome,
            Reconciliation::Confirmed {
                entity: Some(entity)
            }
        );
        assert!(renderer.destroyed.lock().is_empty());
        assert_eq!(renderer.tint_cleared.lock().as_slice(), &[entity]);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn mismatched_confirmation_rolls_back() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());

        let entity = tracker.apply_place(POS, ItemCode::DIRT);
        let outcome = tracker.reconcile(POS, ItemCode::STONE);

        assert_eq!(outcome, Reconciliation::Superseded);
        assert_eq!(renderer.destroyed.lock().as_slice(), &[entity]);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn reconcile_without_entry_is_untracked() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer);
        assert_eq!(tracker.reconcile(POS, ItemCode::GRASS), Reconciliation::Untracked);
    }

    // ---------------------------------------------------------------
    // Removal speculation
    // ---------------------------------------------------------------

    #[test]
    fn removal_hides_then_rollback_restores() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());
        let existing = EntityRef(99);

        tracker.apply_removal(POS, Some(existing));
        assert_eq!(renderer.visibility.lock().as_slice(), &[(existing, false)]);

        // Chain reports the block still there: restore, discard speculation.
        let outcome = tracker.reconcile(POS, ItemCode::GRASS);
        assert_eq!(outcome, Reconciliation::Superseded);
        assert_eq!(renderer.visibility.lock().last(), Some(&(existing, true)));
    }

    #[test]
    fn removal_confirmed_destroys_hidden_entity() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());
        let existing = EntityRef(7);

        tracker.apply_removal(POS, Some(existing));
        let outcome = tracker.reconcile(POS, ItemCode::NONE);
        assert_eq!(outcome, Reconciliation::Confirmed { entity: None });
        assert_eq!(renderer.destroyed.lock().as_slice(), &[existing]);
    }

    // ---------------------------------------------------------------
    // Sweep
    // ---------------------------------------------------------------

    #[test]
    fn sweep_rolls_back_expired_entries_only() {
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = make_tracker(renderer.clone());

        let entity = tracker.apply_place(POS, ItemCode::GRASS);

        tracker.sweep(Instant::now());
        assert_eq!(tracker.pending_count(), 1);

        tracker.sweep(Instant::now() + Duration::from_secs(31));
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(renderer.destroyed.lock().as_slice(), &[entity]);
    }

    // ---------------------------------------------------------------
    // Hotbar coalescing
    // ---------------------------------------------------------------

    #[test]
    fn rapid_selections_coalesce_to_one_pending_slot() {
        let renderer = Arc::new(NullRenderer::default());
        let mut tracker =
            OptimisticTracker::new(renderer, Duration::from_secs(30), Duration::from_secs(2));

        tracker.select_local_slot(2);
        tracker.select_local_slot(5);
        tracker.select_local_slot(7);

        assert_eq!(tracker.selected_slot(), 7);
        assert_eq!(tracker.take_pending_slot(), Some(7));
        assert_eq!(tracker.take_pending_slot(), None);
    }

    #[test]
    fn reselecting_server_slot_clears_pending() {
        let renderer = Arc::new(NullRenderer::default());
        let mut tracker =
            OptimisticTracker::new(renderer, Duration::from_secs(30), Duration::from_secs(2));

        tracker.server_slot_confirmed(3);
        tracker.select_local_slot(3);
        assert_eq!(tracker.take_pending_slot(), None);
    }

    #[test]
    fn stale_local_selection_resets_to_server_slot() {
        let renderer = Arc::new(NullRenderer::default());
        let mut tracker =
            OptimisticTracker::new(renderer, Duration::from_secs(30), Duration::from_secs(2));

        tracker.server_slot_confirmed(1);
        tracker.select_local_slot(6);
        tracker.sweep(Instant::now() + Duration::from_secs(3));
        assert_eq!(tracker.selected_slot(), 1);
        assert_eq!(tracker.take_pending_slot(), None);
    }
}
