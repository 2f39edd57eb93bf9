//! Bridge service: the single entry point the game UI talks to.
//!
//! Inbound, it exposes one `request_*` method per player intent; each applies
//! the optimistic effect locally and enqueues the action for packing. The
//! hotbar is the exception — selections stay local and are queued lazily,
//! just before the first action that depends on them.
//!
//! Outbound, [`Bridge::on_model_update`] consumes every confirmed record
//! from the chain: it closes the in-flight submission, write-throughs the
//! cache, reconciles optimistic state, and drives materialization and space
//! transitions. UI-facing consequences surface as [`BridgeEvent`]s.

use crate::action::Action;
use crate::chunks::{self, ChunkCache, ItemSlot};
use crate::optimistic::{OptimisticTracker, Reconciliation};
use crate::protocol::{
    ChunkModel, GatherableModel, InventoryModel, ModelUpdate, PlayerDataModel, StructureModel,
};
use crate::queue::{ChainSubmitter, TransactionQueue};
use crate::render::Renderer;
use crate::scheduler::Scheduler;
use crate::space::SpaceManager;
use crate::types::{BlockPos, BridgeConfig, ItemCode, SpaceKey, SpawnType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// UI-facing notifications emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// First confirmed record arrived; the world is usable.
    Loaded,
    CoinsChanged { coins: u32 },
    InventoryChanged { id: u16 },
    SpaceChanged { space: SpaceKey },
}

/// Decoded view of one inventory, kept current from confirmed records.
#[derive(Debug, Clone)]
pub struct InventoryView {
    pub inventory_type: u8,
    pub slots: Vec<ItemSlot>,
}

pub struct Bridge {
    config: BridgeConfig,
    queue: TransactionQueue,
    cache: ChunkCache,
    optimistic: OptimisticTracker,
    space: SpaceManager,
    inventories: HashMap<u16, InventoryView>,
    coins: u32,
    loaded: bool,
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        renderer: Arc<dyn Renderer>,
        chain: Arc<dyn ChainSubmitter>,
        scheduler: Arc<dyn Scheduler>,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let queue = TransactionQueue::new(&config, chain, scheduler);
        let optimistic = OptimisticTracker::new(
            renderer.clone(),
            Duration::from_secs(config.optimistic_timeout_secs),
            Duration::from_secs(config.hotbar_timeout_secs),
        );
        let space = SpaceManager::new(renderer, config.player.clone());
        let bridge = Self {
            config,
            queue,
            cache: ChunkCache::new(),
            optimistic,
            space,
            inventories: HashMap::new(),
            coins: 0,
            loaded: false,
            events,
        };
        (bridge, receiver)
    }

    // -----------------------------------------------------------------------
    // Player intents
    // -----------------------------------------------------------------------

    /// Place the held item at `position`, or use whatever occupies it.
    pub fn request_place_use(&mut self, position: BlockPos) {
        self.flush_hotbar();
        if let Some(item) = self.held_item() {
            if self.space.item_at(position).is_none() {
                self.optimistic.apply_place(position, item);
            }
        }
        self.queue.enqueue(Action::PlaceUse { position });
    }

    /// Hit (harvest/remove) whatever occupies `position`.
    pub fn request_hit(&mut self, position: BlockPos) {
        self.flush_hotbar();
        let existing = self.space.entity_at(position);
        self.optimistic.apply_removal(position, existing);
        self.queue.enqueue(Action::Hit { position });
    }

    /// Select a hotbar slot. Purely local: the selection is transmitted
    /// lazily, right before the next action that depends on it, so rapid
    /// scrolling costs at most one queued action.
    pub fn request_select_hotbar(&mut self, slot: u8) {
        self.optimistic.select_local_slot(slot);
    }

    pub fn request_move_item(
        &mut self,
        from_inventory: u8,
        from_slot: u8,
        to_inventory: u8,
        to_slot: u8,
    ) {
        self.swap_slots_locally(from_inventory, from_slot, to_inventory, to_slot);
        self.queue.enqueue(Action::MoveItem {
            from_inventory,
            from_slot,
            to_inventory,
            to_slot,
        });
    }

    pub fn request_craft(&mut self, item: u32) {
        self.queue.enqueue(Action::Craft { item });
    }

    pub fn request_buy(&mut self, item_ids: Vec<u16>, quantities: Vec<u16>) {
        self.queue.enqueue(Action::buy(item_ids, quantities));
    }

    pub fn request_sell(&mut self) {
        self.queue.enqueue(Action::Sell);
    }

    pub fn request_start_process(&mut self, process: u8, input_amount: u32) {
        self.queue.enqueue(Action::StartProcess {
            process,
            input_amount,
        });
    }

    pub fn request_cancel_process(&mut self) {
        self.queue.enqueue(Action::CancelProcess);
    }

    pub fn request_visit(&mut self, space_id: u16) {
        self.flush_hotbar();
        self.queue.enqueue(Action::Visit { space_id });
    }

    pub fn request_visit_new_island(&mut self) {
        self.queue.enqueue(Action::VisitNewIsland);
    }

    pub fn request_generate_island(&mut self) {
        self.queue.enqueue(Action::GenerateIsland);
    }

    /// Submit whatever is queued without waiting for the settle window.
    pub fn flush(&self) {
        self.queue.flush();
    }

    fn flush_hotbar(&mut self) {
        if let Some(slot) = self.optimistic.take_pending_slot() {
            self.queue.enqueue(Action::SelectHotbar { slot });
        }
    }

    /// Expected effect of a move, applied to the local inventory views
    /// immediately. The next confirmed inventory record is authoritative
    /// either way, so there is no entry to track.
    fn swap_slots_locally(
        &mut self,
        from_inventory: u8,
        from_slot: u8,
        to_inventory: u8,
        to_slot: u8,
    ) {
        let from_id = from_inventory as u16;
        let to_id = to_inventory as u16;
        if from_id == to_id {
            if let Some(view) = self.inventories.get_mut(&from_id) {
                let (a, b) = (from_slot as usize, to_slot as usize);
                if a != b && a < view.slots.len() && b < view.slots.len() {
                    view.slots.swap(a, b);
                    self.emit(BridgeEvent::InventoryChanged { id: from_id });
                }
            }
            return;
        }

        let Some(moved) = self
            .inventories
            .get_mut(&from_id)
            .and_then(|v| v.slots.get_mut(from_slot as usize))
            .map(|slot| std::mem::replace(slot, ItemSlot::EMPTY))
        else {
            return;
        };
        match self
            .inventories
            .get_mut(&to_id)
            .and_then(|v| v.slots.get_mut(to_slot as usize))
        {
            Some(dest) => {
                let displaced = std::mem::replace(dest, moved);
                if let Some(src) = self
                    .inventories
                    .get_mut(&from_id)
                    .and_then(|v| v.slots.get_mut(from_slot as usize))
                {
                    *src = displaced;
                }
                self.emit(BridgeEvent::InventoryChanged { id: from_id });
                self.emit(BridgeEvent::InventoryChanged { id: to_id });
            }
            None => {
                // Unknown destination; put the source slot back untouched.
                if let Some(src) = self
                    .inventories
                    .get_mut(&from_id)
                    .and_then(|v| v.slots.get_mut(from_slot as usize))
                {
                    *src = moved;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Confirmed updates
    // -----------------------------------------------------------------------

    /// Consume one confirmed on-chain record. Any record, whatever its
    /// kind, closes the in-flight submission — confirmation is not matched
    /// per action.
    pub fn on_model_update(&mut self, update: ModelUpdate) {
        self.queue.transaction_complete();
        self.cache.ingest(&update);

        match &update {
            ModelUpdate::Chunk(m) => self.apply_chunk(m),
            ModelUpdate::Gatherable(m) => self.apply_gatherable(m),
            ModelUpdate::Structure(m) => self.apply_structure(m),
            ModelUpdate::PlayerData(m) => self.apply_player_data(m),
            ModelUpdate::Inventory(m) => self.apply_inventory(m),
        }

        if !self.loaded {
            self.loaded = true;
            self.emit(BridgeEvent::Loaded);
        }
    }

    /// Roll back optimistic entries and hotbar selections that outlived
    /// their timeout. Driven by the caller's tick.
    pub fn sweep(&mut self) {
        self.optimistic.sweep(Instant::now());
    }

    fn apply_chunk(&mut self, m: &ChunkModel) {
        if !self.in_current_space(&m.island_owner, m.island_id) {
            return;
        }
        let decoded = chunks::parse_chunk_id(&m.chunk_id).and_then(|offset| {
            let cells = chunks::decode_blocks(&m.chunk_id, &m.blocks1, &m.blocks2)?;
            Ok((offset, cells))
        });
        let (offset, cells) = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("ignoring malformed chunk update: {}", err);
                return;
            }
        };
        for (i, &item) in cells.iter().enumerate() {
            let position = chunks::local_to_world(i as u8, offset);
            self.settle_cell(position, item, SpawnType::ChunkBlock);
        }
    }

    fn apply_gatherable(&mut self, m: &GatherableModel) {
        if !self.in_current_space(&m.island_owner, m.island_id) {
            return;
        }
        match chunks::parse_chunk_id(&m.chunk_id) {
            Ok(offset) => {
                let position = chunks::local_to_world(m.position, offset);
                let item = if m.destroyed {
                    ItemCode::NONE
                } else {
                    ItemCode(m.resource_id as u16)
                };
                self.settle_cell(position, item, SpawnType::Gatherable);
            }
            Err(err) => log::warn!("ignoring malformed gatherable update: {}", err),
        }
    }

    fn apply_structure(&mut self, m: &StructureModel) {
        if !self.in_current_space(&m.island_owner, m.island_id) {
            return;
        }
        match chunks::parse_chunk_id(&m.chunk_id) {
            Ok(offset) => {
                let position = chunks::local_to_world(m.position, offset);
                self.settle_cell(position, ItemCode(m.structure_type), SpawnType::Structure);
            }
            Err(err) => log::warn!("ignoring malformed structure update: {}", err),
        }
    }

    fn apply_player_data(&mut self, m: &PlayerDataModel) {
        if m.player != self.config.player {
            return;
        }
        if m.coins != self.coins {
            self.coins = m.coins;
            self.emit(BridgeEvent::CoinsChanged { coins: m.coins });
        }
        let target = m.current_space();
        if &target != self.space.current_space() {
            self.space.transition_to(target.clone(), &self.cache);
            self.emit(BridgeEvent::SpaceChanged { space: target });
        }
    }

    fn apply_inventory(&mut self, m: &InventoryModel) {
        if m.owner != self.config.player {
            return;
        }
        match chunks::decode_slots(m.slot_words()) {
            Ok(slots) => {
                self.inventories.insert(
                    m.id,
                    InventoryView {
                        inventory_type: m.inventory_type,
                        slots,
                    },
                );
                self.emit(BridgeEvent::InventoryChanged { id: m.id });
            }
            Err(err) => log::warn!("ignoring malformed inventory update: {}", err),
        }
    }

    /// Reconcile one confirmed cell against pending optimistic state, then
    /// bring the actor map in line.
    fn settle_cell(&mut self, position: BlockPos, item: ItemCode, spawn_type: SpawnType) {
        match self.optimistic.reconcile(position, item) {
            Reconciliation::Confirmed { entity } => {
                if item.is_none() {
                    // The tracker already tore the entity down.
                    self.space.forget_at(position);
                } else if let Some(entity) = entity {
                    self.space.adopt(position, entity, item, spawn_type);
                } else {
                    self.space.materialize_at(position, item, spawn_type);
                }
            }
            Reconciliation::Superseded | Reconciliation::Untracked => {
                self.space.materialize_at(position, item, spawn_type);
            }
        }
    }

    fn in_current_space(&self, owner: &str, id: u32) -> bool {
        let current = self.space.current_space();
        current.owner == owner && current.id == id
    }

    fn emit(&self, event: BridgeEvent) {
        // A departed UI is not an error.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Read-side accessors
    // -----------------------------------------------------------------------

    pub fn selected_hotbar_slot(&self) -> u8 {
        self.optimistic.selected_slot()
    }

    /// The item in the selected hotbar slot, if the main inventory is known
    /// and the slot is occupied.
    pub fn held_item(&self) -> Option<ItemCode> {
        let main = self.inventories.get(&0)?;
        let slot = main.slots.get(self.optimistic.selected_slot() as usize)?;
        (!slot.is_empty()).then_some(slot.item)
    }

    pub fn inventory(&self, id: u16) -> Option<&InventoryView> {
        self.inventories.get(&id)
    }

    pub fn coins(&self) -> u32 {
        self.coins
    }

    pub fn current_space(&self) -> &SpaceKey {
        self.space.current_space()
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn pending_optimistic(&self) -> usize {
        self.optimistic.pending_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Felt;
    use crate::render::NullRenderer;
    use crate::scheduler::ManualScheduler;
    use parking_lot::Mutex;

    const PLAYER: &str = "0xabc";

    #[derive(Default)]
    struct RecordingChain {
        calls: Mutex<Vec<Vec<Felt>>>,
    }

    impl ChainSubmitter for RecordingChain {
        fn submit(&self, words: &[Felt]) {
            self.calls.lock().push(words.to_vec());
        }
    }

    fn make_bridge() -> (
        Bridge,
        mpsc::UnboundedReceiver<BridgeEvent>,
        Arc<RecordingChain>,
        ManualScheduler,
    ) {
        let chain = Arc::new(RecordingChain::default());
        let scheduler = ManualScheduler::new();
        let config = BridgeConfig {
            player: PLAYER.into(),
            ..Default::default()
        };
        let (bridge, events) = Bridge::new(
            config,
            Arc::new(NullRenderer::default()),
            chain.clone(),
            Arc::new(scheduler.clone()),
        );
        (bridge, events, chain, scheduler)
    }

    fn chunk_id_origin() -> String {
        format!("0x00{:010x}{:010x}{:010x}", 2048, 2048, 2048)
    }

    fn home_chunk(cell0: u8) -> ModelUpdate {
        ModelUpdate::Chunk(ChunkModel {
            island_owner: PLAYER.into(),
            island_id: 1,
            chunk_id: chunk_id_origin(),
            blocks1: format!("0x{:0>32}", "0"),
            blocks2: format!("0x{:0>32}", format!("{:x}", cell0)),
        })
    }

    fn inventory_with_hotbar(item: u16, quantity: u16) -> ModelUpdate {
        ModelUpdate::Inventory(InventoryModel {
            owner: PLAYER.into(),
            id: 0,
            inventory_type: 0,
            slots1: format!("0x{:x}", item as u64 | ((quantity as u64) << 16)),
            slots2: "0x0".into(),
            slots3: "0x0".into(),
            slots4: "0x0".into(),
        })
    }

    // ---------------------------------------------------------------
    // Lazy hotbar
    // ---------------------------------------------------------------

    #[test]
    fn hotbar_selection_is_queued_before_dependent_action() {
        let (mut bridge, _events, _chain, _sched) = make_bridge();

        bridge.request_select_hotbar(4);
        bridge.request_select_hotbar(6);
        assert_eq!(bridge.pending_actions(), 0);
        assert_eq!(bridge.selected_hotbar_slot(), 6);

        bridge.request_place_use(BlockPos::new(8192, 8192, 0));
        // One coalesced selection, then the placement.
        assert_eq!(bridge.pending_actions(), 2);
    }

    // ---------------------------------------------------------------
    // Optimistic place + confirmation
    // ---------------------------------------------------------------

    #[test]
    fn confirmed_chunk_promotes_optimistic_placement() {
        let (mut bridge, _events, _chain, _sched) = make_bridge();
        bridge.on_model_update(inventory_with_hotbar(1, 5)); // grass in hand

        let position = BlockPos::new(8192, 8192, 8192);
        bridge.request_place_use(position);
        assert_eq!(bridge.pending_optimistic(), 1);

        bridge.on_model_update(home_chunk(1));
        assert_eq!(bridge.pending_optimistic(), 0);
    }

    #[test]
    fn mismatched_confirmation_replaces_speculation() {
        let (mut bridge, _events, _chain, _sched) = make_bridge();
        bridge.on_model_update(inventory_with_hotbar(1, 5));

        bridge.request_place_use(BlockPos::new(8192, 8192, 8192));
        // The chain settles on stone instead of grass.
        bridge.on_model_update(home_chunk(3));
        assert_eq!(bridge.pending_optimistic(), 0);
    }

    #[test]
    fn empty_hand_places_nothing_optimistically() {
        let (mut bridge, _events, _chain, _sched) = make_bridge();
        bridge.request_place_use(BlockPos::new(8192, 8192, 0));
        assert_eq!(bridge.pending_optimistic(), 0);
        assert_eq!(bridge.pending_actions(), 1);
    }

    // ---------------------------------------------------------------
    // Completion plumbing
    // ---------------------------------------------------------------

    #[test]
    fn any_model_update_frees_the_queue() {
        let (mut bridge, _events, chain, sched) = make_bridge();
        for i in 0..3 {
            bridge.request_hit(BlockPos::new(8192 + i, 8192, 0));
        }
        assert_eq!(chain.calls.lock().len(), 1);

        bridge.request_sell();
        assert_eq!(chain.calls.lock().len(), 1); // still in flight

        bridge.on_model_update(inventory_with_hotbar(0, 0));
        // Cool-down, then a settle window for the thin trailing batch.
        sched.advance(Duration::from_millis(600));
        assert_eq!(chain.calls.lock().len(), 2);
    }

    // ---------------------------------------------------------------
    // Player data
    // ---------------------------------------------------------------

    #[test]
    fn player_data_drives_coins_and_space_transition() {
        let (mut bridge, mut events, _chain, _sched) = make_bridge();

        bridge.on_model_update(ModelUpdate::PlayerData(PlayerDataModel {
            player: PLAYER.into(),
            coins: 40,
            current_space_owner: PLAYER.into(),
            current_space_id: 2,
        }));

        assert_eq!(bridge.coins(), 40);
        assert_eq!(bridge.current_space(), &SpaceKey::new(PLAYER, 2));
        assert_eq!(
            events.try_recv().unwrap(),
            BridgeEvent::CoinsChanged { coins: 40 }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            BridgeEvent::SpaceChanged {
                space: SpaceKey::new(PLAYER, 2)
            }
        );
        assert_eq!(events.try_recv().unwrap(), BridgeEvent::Loaded);
    }

    #[test]
    fn other_players_records_do_not_touch_local_state() {
        let (mut bridge, _events, _chain, _sched) = make_bridge();

        bridge.on_model_update(ModelUpdate::PlayerData(PlayerDataModel {
            player: "0xother".into(),
            coins: 999,
            current_space_owner: "0xother".into(),
            current_space_id: 1,
        }));
        assert_eq!(bridge.coins(), 0);
        assert!(bridge.current_space().is_home_of(PLAYER));

        // Another player's chunk is cached but not materialized here.
        bridge.on_model_update(ModelUpdate::Chunk(ChunkModel {
            island_owner: "0xother".into(),
            island_id: 1,
            chunk_id: chunk_id_origin(),
            blocks1: format!("0x{:0>32}", "0"),
            blocks2: format!("0x{:0>32}", "7"),
        }));
        assert_eq!(bridge.pending_optimistic(), 0);
    }

    // ---------------------------------------------------------------
    // Inventory
    // ---------------------------------------------------------------

    #[test]
    fn inventory_update_defines_the_held_item() {
        let (mut bridge, mut events, _chain, _sched) = make_bridge();
        assert_eq!(bridge.held_item(), None);

        bridge.on_model_update(inventory_with_hotbar(3, 2));
        assert_eq!(bridge.held_item(), Some(ItemCode::STONE));
        assert_eq!(
            events.try_recv().unwrap(),
            BridgeEvent::InventoryChanged { id: 0 }
        );
        assert_eq!(events.try_recv().unwrap(), BridgeEvent::Loaded);

        bridge.request_select_hotbar(1);
        assert_eq!(bridge.held_item(), None);
    }
}
