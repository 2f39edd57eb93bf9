//! Core value types shared across all modules.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Block positions
// ---------------------------------------------------------------------------

/// Integer voxel position in chain coordinates.
///
/// X and Y are pre-normalized to the 8192 world offset before they reach the
/// queue; for queued place/hit actions Z is 0 or 1 and distinguishes the two
/// valid ground-relative levels.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

/// Identifies one isolated chunked world instance (an island, a building
/// interior...). Two keys are equal iff both components match exactly.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpaceKey {
    /// Owner address, "0x"-prefixed hex string.
    pub owner: String,
    pub id: u32,
}

impl SpaceKey {
    pub fn new(owner: impl Into<String>, id: u32) -> Self {
        Self {
            owner: owner.into(),
            id,
        }
    }

    /// The distinguished "home" space of a player is id 1 under their address.
    pub fn is_home_of(&self, player: &str) -> bool {
        self.owner == player && self.id == 1
    }
}

impl std::fmt::Display for SpaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.owner, self.id)
    }
}

// ---------------------------------------------------------------------------
// Items & spawn classification
// ---------------------------------------------------------------------------

/// On-chain item code. Chunk cells carry a nibble (0..=15); gatherables and
/// structures carry wider codes.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ItemCode(pub u16);

impl ItemCode {
    pub const NONE: ItemCode = ItemCode(0);
    pub const GRASS: ItemCode = ItemCode(1);
    pub const DIRT: ItemCode = ItemCode(2);
    pub const STONE: ItemCode = ItemCode(3);
    pub const HOUSE: ItemCode = ItemCode(30);
    pub const OAK_TREE: ItemCode = ItemCode(31);
    pub const ROCK: ItemCode = ItemCode(33);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// What kind of visual object a position holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnType {
    ChunkBlock,
    Gatherable,
    Structure,
}

/// Opaque handle to a visual entity owned by the rendering collaborator.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct EntityRef(pub u64);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Local player address; decides home-space and ownership checks.
    pub player: String,
    /// Maximum queue depth before oldest entries are evicted.
    pub max_queue_size: usize,
    /// Maximum actions drained into one submission.
    pub max_batch_size: usize,
    /// Queue depth at which a batch is sent without waiting to settle.
    pub force_send_size: usize,
    /// Settle window before submitting a thin batch, in milliseconds.
    pub batch_wait_ms: u64,
    /// Hard deadline on an in-flight submission, in milliseconds.
    pub transaction_timeout_ms: u64,
    /// Pause between a completed submission and the next, in milliseconds.
    pub cooldown_ms: u64,
    /// Age at which a pending optimistic entry is force-rolled-back, seconds.
    pub optimistic_timeout_secs: u64,
    /// Age at which an unsent local hotbar selection resets, seconds.
    pub hotbar_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            player: "0x0".into(),
            max_queue_size: 1000,
            max_batch_size: 10,
            force_send_size: 8,
            batch_wait_ms: 500,
            transaction_timeout_ms: 10_000,
            cooldown_ms: 100,
            optimistic_timeout_secs: 30,
            hotbar_timeout_secs: 2,
        }
    }
}
