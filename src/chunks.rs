//! Chunked world reconstruction and caching.
//!
//! Every confirmed world record is stored here, keyed by space, whether or
//! not it is currently materialized. Leaving a space hides its actors;
//! returning replays the cached records instead of waiting for the chain to
//! resend them.
//!
//! ## Decode rules
//!
//! A chunk's occupancy travels as two hex half-bitfields that must
//! concatenate to exactly 64 hex characters — anything else is logged and
//! the whole record skipped, never partially materialized. The nibble
//! sequence is reversed, then nibble `i` is the item code of local cell
//! `(i % 4, (i / 4) % 4, (i / 16) % 4)`. World position is the local cell
//! plus `chunk_offset * 4` plus the 8192 centering bias per axis.
//!
//! The chunk id packs the offset triple as three 40-bit hex fields at
//! character offsets 4, 14 and 24, each biased by 2048.

use crate::codec::{read_bits, Felt};
use crate::error::BridgeError;
use crate::protocol::{ChunkModel, GatherableModel, ModelUpdate, StructureModel};
use crate::types::{BlockPos, ItemCode, SpaceKey, SpawnType};
use std::collections::HashMap;

/// Cells per chunk: a 4x4x4 cube, one nibble each.
pub const CHUNK_CELLS: usize = 64;

/// Centering bias applied to every world axis.
pub const WORLD_BIAS: i32 = 8192;

/// Bias applied to each packed chunk-offset field.
const OFFSET_BIAS: i64 = 2048;

/// Inventory slots packed into one felt: 32 bits per slot.
pub const SLOTS_PER_FELT: usize = 7;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Extract the chunk offset triple from a packed chunk id.
pub fn parse_chunk_id(chunk_id: &str) -> Result<BlockPos, BridgeError> {
    if chunk_id.len() < 34 || !chunk_id.is_ascii() {
        return Err(BridgeError::MalformedChunkId(chunk_id.to_string()));
    }
    let field = |start: usize| -> Result<i32, BridgeError> {
        i64::from_str_radix(&chunk_id[start..start + 10], 16)
            .map(|v| (v - OFFSET_BIAS) as i32)
            .map_err(|_| BridgeError::InvalidHex {
                context: "chunk id",
                text: chunk_id.to_string(),
            })
    };
    Ok(BlockPos::new(field(4)?, field(14)?, field(24)?))
}

/// Decode the two half-bitfields into one item code per local cell.
pub fn decode_blocks(
    chunk_id: &str,
    blocks1: &str,
    blocks2: &str,
) -> Result<[ItemCode; CHUNK_CELLS], BridgeError> {
    let concat = format!(
        "{}{}",
        blocks1.strip_prefix("0x").unwrap_or(blocks1),
        blocks2.strip_prefix("0x").unwrap_or(blocks2),
    );
    if concat.len() != CHUNK_CELLS {
        return Err(BridgeError::MalformedChunk {
            chunk_id: chunk_id.to_string(),
            len: concat.len(),
        });
    }

    let mut cells = [ItemCode::NONE; CHUNK_CELLS];
    for (i, c) in concat.chars().rev().enumerate() {
        let nibble = c.to_digit(16).ok_or_else(|| BridgeError::InvalidHex {
            context: "chunk bitfield",
            text: concat.clone(),
        })?;
        cells[i] = ItemCode(nibble as u16);
    }
    Ok(cells)
}

/// Map a local cell index to chain-world coordinates.
pub fn local_to_world(index: u8, chunk_offset: BlockPos) -> BlockPos {
    let i = index as i32;
    BlockPos::new(
        (i % 4) + chunk_offset.x * 4 + WORLD_BIAS,
        ((i / 4) % 4) + chunk_offset.y * 4 + WORLD_BIAS,
        ((i / 16) % 4) + chunk_offset.z * 4 + WORLD_BIAS,
    )
}

// ---------------------------------------------------------------------------
// Inventory slots
// ---------------------------------------------------------------------------

/// One decoded inventory slot: item id in the low 16 bits, quantity above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSlot {
    pub item: ItemCode,
    pub quantity: u16,
}

impl ItemSlot {
    pub const EMPTY: ItemSlot = ItemSlot {
        item: ItemCode::NONE,
        quantity: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.item.is_none() || self.quantity == 0
    }
}

/// Decode the four packed slot words of an inventory record. Always yields
/// `4 * SLOTS_PER_FELT` slots; trailing empties are kept so slot indices
/// stay stable.
pub fn decode_slots(words: [&str; 4]) -> Result<Vec<ItemSlot>, BridgeError> {
    let mut slots = Vec::with_capacity(4 * SLOTS_PER_FELT);
    for word in words {
        let felt = Felt::from_hex(word, "inventory slots")?;
        let mut offset = 0;
        for _ in 0..SLOTS_PER_FELT {
            let item = ItemCode(read_bits(&felt, &mut offset, 16) as u16);
            let quantity = read_bits(&felt, &mut offset, 16) as u16;
            slots.push(ItemSlot { item, quantity });
        }
    }
    Ok(slots)
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// A materialization request produced by replaying cached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnCommand {
    pub position: BlockPos,
    pub item: ItemCode,
    pub spawn_type: SpawnType,
}

/// All records known for one space.
#[derive(Debug, Default)]
pub struct SpaceChunks {
    chunks: HashMap<String, ChunkModel>,
    gatherables: HashMap<(String, u8), GatherableModel>,
    structures: HashMap<(String, u8), StructureModel>,
}

impl SpaceChunks {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.gatherables.is_empty() && self.structures.is_empty()
    }
}

/// Write-through cache of decoded-world records, keyed by space. Entries
/// accumulate for the lifetime of the process; re-ingesting a record for an
/// existing key replaces it in place.
#[derive(Debug, Default)]
pub struct ChunkCache {
    spaces: HashMap<SpaceKey, SpaceChunks>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one confirmed record. Returns the space it landed in; player
    /// and inventory records are not space-scoped and pass through.
    pub fn ingest(&mut self, update: &ModelUpdate) -> Option<SpaceKey> {
        let key = update.space_key()?;
        let space = self.spaces.entry(key.clone()).or_default();
        match update {
            ModelUpdate::Chunk(m) => {
                space.chunks.insert(m.chunk_id.clone(), m.clone());
            }
            ModelUpdate::Gatherable(m) => {
                space
                    .gatherables
                    .insert((m.chunk_id.clone(), m.position), m.clone());
            }
            ModelUpdate::Structure(m) => {
                space
                    .structures
                    .insert((m.chunk_id.clone(), m.position), m.clone());
            }
            // space_key() is None for the remaining variants.
            ModelUpdate::PlayerData(_) | ModelUpdate::Inventory(_) => {}
        }
        Some(key)
    }

    pub fn space(&self, key: &SpaceKey) -> Option<&SpaceChunks> {
        self.spaces.get(key)
    }

    /// Whether the space has any voxel chunks at all — a chunkless space
    /// gets a placeholder structure instead of terrain.
    pub fn has_chunks(&self, key: &SpaceKey) -> bool {
        self.spaces
            .get(key)
            .map(|s| !s.chunks.is_empty())
            .unwrap_or(false)
    }

    /// Replay cached records into spawn commands, optionally restricted to
    /// one chunk id. Malformed records are logged and skipped.
    pub fn replay(&self, key: &SpaceKey, chunk_filter: Option<&str>) -> Vec<SpawnCommand> {
        let mut out = Vec::new();
        let Some(space) = self.spaces.get(key) else {
            return out;
        };

        for (chunk_id, chunk) in &space.chunks {
            if chunk_filter.is_some_and(|f| f != chunk_id) {
                continue;
            }
            match chunk_spawns(chunk) {
                Ok(spawns) => out.extend(spawns),
                Err(err) => log::warn!("skipping chunk {} in {}: {}", chunk_id, key, err),
            }
        }

        for ((chunk_id, position), gatherable) in &space.gatherables {
            if chunk_filter.is_some_and(|f| f != chunk_id) || gatherable.destroyed {
                continue;
            }
            match parse_chunk_id(chunk_id) {
                Ok(offset) => out.push(SpawnCommand {
                    position: local_to_world(*position, offset),
                    item: ItemCode(gatherable.resource_id as u16),
                    spawn_type: SpawnType::Gatherable,
                }),
                Err(err) => log::warn!("skipping gatherable in {}: {}", key, err),
            }
        }

        for ((chunk_id, position), structure) in &space.structures {
            if chunk_filter.is_some_and(|f| f != chunk_id) {
                continue;
            }
            match parse_chunk_id(chunk_id) {
                Ok(offset) => out.push(SpawnCommand {
                    position: local_to_world(*position, offset),
                    item: ItemCode(structure.structure_type),
                    spawn_type: SpawnType::Structure,
                }),
                Err(err) => log::warn!("skipping structure in {}: {}", key, err),
            }
        }

        out
    }
}

fn chunk_spawns(chunk: &ChunkModel) -> Result<Vec<SpawnCommand>, BridgeError> {
    let offset = parse_chunk_id(&chunk.chunk_id)?;
    let cells = decode_blocks(&chunk.chunk_id, &chunk.blocks1, &chunk.blocks2)?;
    Ok(cells
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_none())
        .map(|(i, &item)| SpawnCommand {
            position: local_to_world(i as u8, offset),
            item,
            spawn_type: SpawnType::ChunkBlock,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_id(x: i64, y: i64, z: i64) -> String {
        format!(
            "0x00{:010x}{:010x}{:010x}",
            x + OFFSET_BIAS,
            y + OFFSET_BIAS,
            z + OFFSET_BIAS
        )
    }

    fn full_width(tail: &str) -> String {
        format!("0x{:0>32}", tail)
    }

    // ---------------------------------------------------------------
    // Chunk id
    // ---------------------------------------------------------------

    #[test]
    fn chunk_id_round_trips_signed_offsets() {
        let id = chunk_id(1, 0, -3);
        assert_eq!(parse_chunk_id(&id).unwrap(), BlockPos::new(1, 0, -3));
    }

    #[test]
    fn short_chunk_id_is_rejected() {
        assert!(matches!(
            parse_chunk_id("0x1234"),
            Err(BridgeError::MalformedChunkId(_))
        ));
    }

    // ---------------------------------------------------------------
    // Block bitfields
    // ---------------------------------------------------------------

    #[test]
    fn last_nibble_of_second_half_is_cell_zero() {
        let cells = decode_blocks("c", &full_width("0"), &full_width("5")).unwrap();
        assert_eq!(cells[0], ItemCode(5));
        assert!(cells[1..].iter().all(|c| c.is_none()));
    }

    #[test]
    fn last_nibble_of_first_half_is_cell_thirty_two() {
        let cells = decode_blocks("c", &full_width("3"), &full_width("0")).unwrap();
        assert_eq!(cells[32], ItemCode(3));
    }

    #[test]
    fn wrong_width_bitfield_is_rejected() {
        let err = decode_blocks("c", &full_width("1"), "0x0").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedChunk { len: 33, .. }));
    }

    // ---------------------------------------------------------------
    // Cell -> world mapping
    // ---------------------------------------------------------------

    #[test]
    fn cell_index_maps_through_chunk_offset_and_bias() {
        let origin = BlockPos::new(0, 0, 0);
        assert_eq!(local_to_world(0, origin), BlockPos::new(8192, 8192, 8192));
        assert_eq!(local_to_world(5, origin), BlockPos::new(8193, 8193, 8192));
        assert_eq!(local_to_world(21, origin), BlockPos::new(8193, 8193, 8193));

        let offset = BlockPos::new(1, 0, -3);
        assert_eq!(local_to_world(0, offset), BlockPos::new(8196, 8192, 8180));
    }

    // ---------------------------------------------------------------
    // Inventory slots
    // ---------------------------------------------------------------

    #[test]
    fn slots_decode_seven_per_word() {
        // Slot 0: item 3 x2. Slot 1: item 7 x1.
        let word1 = format!("0x{:x}", (3u64 | (2 << 16)) | ((7 | (1 << 16)) << 32));
        let slots = decode_slots([&word1, "0x0", "0x0", "0x0"]).unwrap();
        assert_eq!(slots.len(), 28);
        assert_eq!(
            slots[0],
            ItemSlot {
                item: ItemCode(3),
                quantity: 2
            }
        );
        assert_eq!(
            slots[1],
            ItemSlot {
                item: ItemCode(7),
                quantity: 1
            }
        );
        assert!(slots[2].is_empty());
    }

    // ---------------------------------------------------------------
    // Cache
    // ---------------------------------------------------------------

    fn chunk_update(space: &SpaceKey, id: &str, blocks1: &str, blocks2: &str) -> ModelUpdate {
        ModelUpdate::Chunk(ChunkModel {
            island_owner: space.owner.clone(),
            island_id: space.id,
            chunk_id: id.to_string(),
            blocks1: blocks1.to_string(),
            blocks2: blocks2.to_string(),
        })
    }

    #[test]
    fn reingesting_a_chunk_replaces_it_in_place() {
        let space = SpaceKey::new("0xabc", 1);
        let id = chunk_id(0, 0, 0);
        let mut cache = ChunkCache::new();

        cache.ingest(&chunk_update(&space, &id, &full_width("1"), &full_width("0")));
        cache.ingest(&chunk_update(&space, &id, &full_width("2"), &full_width("0")));

        assert_eq!(cache.space(&space).unwrap().chunk_count(), 1);
        let spawns = cache.replay(&space, None);
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].item, ItemCode(2));
    }

    #[test]
    fn replay_skips_malformed_records() {
        let space = SpaceKey::new("0xabc", 1);
        let mut cache = ChunkCache::new();
        cache.ingest(&chunk_update(&space, &chunk_id(0, 0, 0), "0x1", "0x0"));

        assert!(cache.replay(&space, None).is_empty());
        // The record is cached even though it cannot decode.
        assert!(cache.has_chunks(&space));
    }

    #[test]
    fn replay_filters_by_chunk_id() {
        let space = SpaceKey::new("0xabc", 1);
        let near = chunk_id(0, 0, 0);
        let far = chunk_id(5, 0, 0);
        let mut cache = ChunkCache::new();
        cache.ingest(&chunk_update(&space, &near, &full_width("0"), &full_width("1")));
        cache.ingest(&chunk_update(&space, &far, &full_width("0"), &full_width("1")));

        assert_eq!(cache.replay(&space, None).len(), 2);
        let filtered = cache.replay(&space, Some(near.as_str()));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].position, BlockPos::new(8192, 8192, 8192));
    }

    #[test]
    fn destroyed_gatherables_do_not_replay() {
        let space = SpaceKey::new("0xabc", 1);
        let id = chunk_id(0, 0, 0);
        let mut cache = ChunkCache::new();

        let mut gatherable = GatherableModel {
            island_owner: space.owner.clone(),
            island_id: space.id,
            chunk_id: id.clone(),
            position: 5,
            resource_id: 31,
            planted_at: 0,
            next_harvest_at: 0,
            harvested_at: 0,
            max_harvest: 3,
            remained_harvest: 3,
            destroyed: false,
        };
        cache.ingest(&ModelUpdate::Gatherable(gatherable.clone()));
        let spawns = cache.replay(&space, None);
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].spawn_type, SpawnType::Gatherable);
        assert_eq!(spawns[0].position, local_to_world(5, BlockPos::new(0, 0, 0)));

        // The destroy update supersedes the live record.
        gatherable.destroyed = true;
        cache.ingest(&ModelUpdate::Gatherable(gatherable));
        assert!(cache.replay(&space, None).is_empty());
    }

    #[test]
    fn structures_replay_with_their_type() {
        let space = SpaceKey::new("0xabc", 2);
        let mut cache = ChunkCache::new();
        cache.ingest(&ModelUpdate::Structure(StructureModel {
            island_owner: space.owner.clone(),
            island_id: space.id,
            chunk_id: chunk_id(0, 0, 0),
            position: 0,
            structure_type: 30,
            completed: true,
            linked_space: Some(3),
        }));

        let spawns = cache.replay(&space, None);
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].item, ItemCode(30));
        assert_eq!(spawns[0].spawn_type, SpawnType::Structure);
    }
}
