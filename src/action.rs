//! Player actions and their wire classification.
//!
//! An [`Action`] is immutable once constructed; the queue never mutates a
//! queued action, only removes it. Every variant carries exactly the fields
//! its packed encoding needs.

use crate::types::BlockPos;
use serde::{Deserialize, Serialize};

/// One (id, quantity) pair limit for a single packed buy word: two 8-bit
/// tags + 8-bit count + 7 * 32 bits = 248 of 256 bits.
pub const MAX_BUY_PAIRS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Action {
    /// Place the selected item at (or use) a target block.
    PlaceUse { position: BlockPos },
    /// Hit the block at the target position.
    Hit { position: BlockPos },
    SelectHotbar { slot: u8 },
    MoveItem {
        from_inventory: u8,
        from_slot: u8,
        to_inventory: u8,
        to_slot: u8,
    },
    Craft { item: u32 },
    Buy {
        item_ids: Vec<u16>,
        quantities: Vec<u16>,
    },
    Sell,
    StartProcess { process: u8, input_amount: u32 },
    CancelProcess,
    Visit { space_id: u16 },
    VisitNewIsland,
    GenerateIsland,
}

/// Wire type codes, shared by the Kind-2 and Kind-3 encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionType {
    PlaceUse = 0,
    Hit = 1,
    SelectHotbar = 2,
    MoveItem = 3,
    Craft = 4,
    Buy = 5,
    Sell = 6,
    StartProcess = 7,
    CancelProcess = 8,
    Visit = 9,
    VisitNewIsland = 10,
    GenerateIsland = 11,
}

impl Action {
    /// Construct a buy action, truncating to the single-word pair limit.
    /// Parallel sequences are truncated to the shorter of the two.
    pub fn buy(item_ids: Vec<u16>, quantities: Vec<u16>) -> Self {
        let n = item_ids.len().min(quantities.len());
        if n > MAX_BUY_PAIRS {
            log::warn!(
                "buy action truncated from {} to {} item pairs",
                n,
                MAX_BUY_PAIRS
            );
        }
        let n = n.min(MAX_BUY_PAIRS);
        Action::Buy {
            item_ids: item_ids[..n].to_vec(),
            quantities: quantities[..n].to_vec(),
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Action::PlaceUse { .. } => ActionType::PlaceUse,
            Action::Hit { .. } => ActionType::Hit,
            Action::SelectHotbar { .. } => ActionType::SelectHotbar,
            Action::MoveItem { .. } => ActionType::MoveItem,
            Action::Craft { .. } => ActionType::Craft,
            Action::Buy { .. } => ActionType::Buy,
            Action::Sell => ActionType::Sell,
            Action::StartProcess { .. } => ActionType::StartProcess,
            Action::CancelProcess => ActionType::CancelProcess,
            Action::Visit { .. } => ActionType::Visit,
            Action::VisitNewIsland => ActionType::VisitNewIsland,
            Action::GenerateIsland => ActionType::GenerateIsland,
        }
    }

    /// True when the action can share a packed word with compatible
    /// neighbours (kinds 0, 1 and 2).
    pub fn is_batchable(&self) -> bool {
        matches!(
            self,
            Action::PlaceUse { .. }
                | Action::Hit { .. }
                | Action::SelectHotbar { .. }
                | Action::MoveItem { .. }
                | Action::Sell
                | Action::CancelProcess
                | Action::Visit { .. }
                | Action::VisitNewIsland
        )
    }

    /// True when the action fits a Kind-2 run: an 8-bit type code plus at
    /// most 16 payload bits. Positions (29 bits) never qualify; place/hit
    /// travel through Kind 0 instead.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Action::SelectHotbar { .. }
                | Action::Sell
                | Action::CancelProcess
                | Action::Visit { .. }
                | Action::VisitNewIsland
        )
    }

    /// Kind-2 payload width in bits, excluding the 8-bit type code.
    pub fn simple_payload_bits(&self) -> Option<u32> {
        match self {
            Action::SelectHotbar { .. } => Some(8),
            Action::Visit { .. } => Some(16),
            Action::Sell | Action::CancelProcess | Action::VisitNewIsland => Some(0),
            _ => None,
        }
    }
}
