//! Confirmed model updates arriving from the chain indexer.
//!
//! This module owns **every record that crosses the chain boundary** into
//! the bridge. Outbound traffic is not here: submissions travel as packed
//! words (see `codec`), and completion is signaled back through one of
//! these records rather than a return value.
//!
//! ## Model kinds
//!
//! | Variant      | Keyed by                    | Carries                      |
//! |--------------|-----------------------------|------------------------------|
//! | `Chunk`      | space + chunk id            | two hex half-bitfields       |
//! | `Gatherable` | space + (chunk, local cell) | growth timers, harvest state |
//! | `Structure`  | space + (chunk, local cell) | type, completion, link       |
//! | `PlayerData` | player address              | coins, current space         |
//! | `Inventory`  | owner + inventory id        | four packed slot felts       |
//!
//! ## Design rules
//!
//! 1. Every struct must be `Serialize + Deserialize` with snake_case JSON.
//! 2. The kind is decided once, at ingestion, by the enum tag — no
//!    stringly-typed dispatch past this boundary.
//! 3. Hex payloads stay as strings here; decoding (and validation) happens
//!    in `chunks`, where a malformed record can be logged and skipped
//!    without poisoning the rest of the update stream.

use crate::types::SpaceKey;
use serde::{Deserialize, Serialize};

/// One confirmed on-chain state change, delivered in arbitrary order
/// relative to the submission that caused it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelUpdate {
    Chunk(ChunkModel),
    Gatherable(GatherableModel),
    Structure(StructureModel),
    PlayerData(PlayerDataModel),
    Inventory(InventoryModel),
}

impl ModelUpdate {
    /// The space a world record belongs to. Player data and inventories are
    /// not space-scoped.
    pub fn space_key(&self) -> Option<SpaceKey> {
        match self {
            ModelUpdate::Chunk(m) => Some(SpaceKey::new(&m.island_owner, m.island_id)),
            ModelUpdate::Gatherable(m) => Some(SpaceKey::new(&m.island_owner, m.island_id)),
            ModelUpdate::Structure(m) => Some(SpaceKey::new(&m.island_owner, m.island_id)),
            ModelUpdate::PlayerData(_) | ModelUpdate::Inventory(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// World records (space-scoped)
// ---------------------------------------------------------------------------

/// One chunk's voxel occupancy: two fixed-width hex words that concatenate
/// to 64 hex characters, one item-code nibble per local cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkModel {
    pub island_owner: String,
    pub island_id: u32,
    /// Hex-packed offset triple, see `chunks::parse_chunk_id`.
    pub chunk_id: String,
    pub blocks1: String,
    pub blocks2: String,
}

/// A growing/harvestable resource occupying a single cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherableModel {
    pub island_owner: String,
    pub island_id: u32,
    pub chunk_id: String,
    /// Packed local cell index (0..64), same layout as a chunk nibble index.
    pub position: u8,
    pub resource_id: u32,
    pub planted_at: u64,
    pub next_harvest_at: u64,
    pub harvested_at: u64,
    pub max_harvest: u8,
    pub remained_harvest: u8,
    pub destroyed: bool,
}

/// A placed structure occupying a single cell. A completed structure may
/// link to another space (a building interior).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureModel {
    pub island_owner: String,
    pub island_id: u32,
    pub chunk_id: String,
    pub position: u8,
    pub structure_type: u16,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_space: Option<u32>,
}

// ---------------------------------------------------------------------------
// Player records
// ---------------------------------------------------------------------------

/// Per-player header: currency balance and which space the chain believes
/// the player is in. A change of `current_space` drives a space transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDataModel {
    pub player: String,
    pub coins: u32,
    pub current_space_owner: String,
    pub current_space_id: u32,
}

impl PlayerDataModel {
    pub fn current_space(&self) -> SpaceKey {
        SpaceKey::new(&self.current_space_owner, self.current_space_id)
    }
}

/// One inventory's slots, packed seven to a felt (see `chunks::decode_slots`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryModel {
    pub owner: String,
    pub id: u16,
    /// 0 = main inventory (slots 0..=8 double as the hotbar), 1 = craft
    /// grid, 2 = storage.
    pub inventory_type: u8,
    pub slots1: String,
    pub slots2: String,
    pub slots3: String,
    pub slots4: String,
}

impl InventoryModel {
    pub fn slot_words(&self) -> [&str; 4] {
        [&self.slots1, &self.slots2, &self.slots3, &self.slots4]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
