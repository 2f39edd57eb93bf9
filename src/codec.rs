//! Packed-word codec: the bit writer every encoder shares, the `Felt` wire
//! word, and the action encoder that turns an ordered batch of player
//! actions into as few 256-bit words as possible.
//!
//! ## Word kinds
//!
//! | Kind | Tag | Contents                                             |
//! |------|-----|------------------------------------------------------|
//! | 0    | 0   | count(4) + up to 8 place/hit: disc(1) x(14) y(14) z(1) |
//! | 1    | 1   | count(4) + up to 6 moves: four 8-bit slot fields     |
//! | 2    | 2   | count(8) + run of simple actions: type(8) + payload  |
//! | 3    | 3   | type(8) + one large action (craft / buy / process...) |
//!
//! Bits are written least-significant-first at a running offset; the word
//! renders big-endian as the "0x"-prefixed hex string the chain call takes.

use crate::action::Action;
use crate::error::BridgeError;

/// Size of one field element in bytes.
pub const FELT_BYTES: usize = 32;

/// Total bit capacity of one packed word.
pub const FELT_BITS: u32 = 256;

/// Kind-2 packing stops once remaining capacity drops under this margin.
const KIND2_MARGIN_BITS: u32 = 16;

// ---------------------------------------------------------------------------
// Felt
// ---------------------------------------------------------------------------

/// One 256-bit on-chain call argument. Produced only by the encoder; carries
/// no semantic fields of its own.
///
/// Bytes are stored little-endian (byte 0 is least significant) so the bit
/// writer can append without shifting; [`Felt::to_hex`] renders big-endian.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Felt([u8; FELT_BYTES]);

impl Felt {
    pub fn zero() -> Self {
        Felt([0u8; FELT_BYTES])
    }

    pub fn as_bytes(&self) -> &[u8; FELT_BYTES] {
        &self.0
    }

    /// Parse a "0x"-prefixed big-endian hex string. The inverse of
    /// [`Felt::to_hex`]; accepts any length up to 64 digits.
    pub fn from_hex(text: &str, context: &'static str) -> Result<Self, BridgeError> {
        let digits = text.strip_prefix("0x").unwrap_or(text);
        if digits.is_empty() || digits.len() > FELT_BYTES * 2 {
            return Err(BridgeError::InvalidHex {
                context,
                text: text.to_string(),
            });
        }
        let mut buf = [0u8; FELT_BYTES];
        for (i, c) in digits.chars().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or_else(|| BridgeError::InvalidHex {
                context,
                text: text.to_string(),
            })? as u8;
            buf[i / 2] |= nibble << ((i % 2) * 4);
        }
        Ok(Felt(buf))
    }

    /// Render as a "0x"-prefixed big-endian hex string with leading zero
    /// bytes collapsed. At least one digit is always retained.
    pub fn to_hex(&self) -> String {
        let first = match self.0.iter().rposition(|&b| b != 0) {
            Some(idx) => idx,
            None => return "0x0".into(),
        };
        let mut s = String::with_capacity(2 + (first + 1) * 2);
        s.push_str("0x");
        // Highest non-zero byte keeps no leading zero digit.
        s.push_str(&format!("{:x}", self.0[first]));
        for i in (0..first).rev() {
            s.push_str(&format!("{:02x}", self.0[i]));
        }
        s
    }
}

impl std::fmt::Debug for Felt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl std::fmt::Display for Felt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Bit writer
// ---------------------------------------------------------------------------

/// Write the low `width` bits of `value` at `*offset`, least-significant bit
/// first, advancing the offset. Bits that would land past the 32-byte buffer
/// are silently dropped; callers are responsible for pre-checking capacity.
pub fn write_bits(buf: &mut [u8; FELT_BYTES], offset: &mut u32, value: u64, width: u32) {
    for i in 0..width {
        let bit_index = *offset + i;
        if bit_index >= FELT_BITS {
            break;
        }
        if (value >> i) & 1 == 1 {
            buf[(bit_index / 8) as usize] |= 1 << (bit_index % 8);
        }
    }
    *offset += width;
}

/// Read `width` bits at `*offset`, advancing the offset. The decoding dual of
/// [`write_bits`]; reads past the buffer yield zero bits.
pub fn read_bits(felt: &Felt, offset: &mut u32, width: u32) -> u64 {
    let mut value = 0u64;
    for i in 0..width {
        let bit_index = *offset + i;
        if bit_index >= FELT_BITS {
            break;
        }
        if felt.0[(bit_index / 8) as usize] >> (bit_index % 8) & 1 == 1 {
            value |= 1 << i;
        }
    }
    *offset += width;
    value
}

// ---------------------------------------------------------------------------
// Action encoder
// ---------------------------------------------------------------------------

/// Encode an ordered action batch into packed words.
///
/// Actions are processed strictly in order; none is reordered or dropped.
/// Each step selects a kind for the next unconsumed prefix and emits one
/// word. A kind attempt never packs zero actions: the dispatch below only
/// enters a kind the head action belongs to.
pub fn encode_actions(actions: &[Action]) -> Vec<Felt> {
    let mut words = Vec::new();
    let mut index = 0;

    while index < actions.len() {
        let word = match &actions[index] {
            Action::PlaceUse { .. } | Action::Hit { .. } => pack_kind0(actions, &mut index),
            Action::MoveItem { .. } => pack_kind1(actions, &mut index),
            a if a.is_simple() => pack_kind2(actions, &mut index),
            a => {
                index += 1;
                pack_kind3(a)
            }
        };
        words.push(word);
    }

    log::debug!("encoded {} actions into {} words", actions.len(), words.len());
    words
}

/// Kind 0: up to 8 place/hit actions, 30 bits each after tag and count.
fn pack_kind0(actions: &[Action], index: &mut usize) -> Felt {
    let mut buf = [0u8; FELT_BYTES];
    let mut offset = 12; // tag(8) + count(4), both written after the run

    let mut count = 0u64;
    while *index < actions.len() && count < 8 {
        let (disc, pos) = match &actions[*index] {
            Action::PlaceUse { position } => (0u64, position),
            Action::Hit { position } => (1u64, position),
            _ => break,
        };
        write_bits(&mut buf, &mut offset, disc, 1);
        write_bits(&mut buf, &mut offset, pos.x as u64 & 0x3FFF, 14);
        write_bits(&mut buf, &mut offset, pos.y as u64 & 0x3FFF, 14);
        write_bits(&mut buf, &mut offset, (pos.z != 0) as u64, 1);
        count += 1;
        *index += 1;
    }

    let mut tag_offset = 0;
    write_bits(&mut buf, &mut tag_offset, 0, 8);
    let mut count_offset = 8;
    write_bits(&mut buf, &mut count_offset, count, 4);
    Felt(buf)
}

/// Kind 1: up to 6 inventory moves, four 8-bit fields each.
fn pack_kind1(actions: &[Action], index: &mut usize) -> Felt {
    let mut buf = [0u8; FELT_BYTES];
    let mut offset = 12;

    let mut count = 0u64;
    while *index < actions.len() && count < 6 {
        let Action::MoveItem {
            from_inventory,
            from_slot,
            to_inventory,
            to_slot,
        } = &actions[*index]
        else {
            break;
        };
        write_bits(&mut buf, &mut offset, *from_inventory as u64, 8);
        write_bits(&mut buf, &mut offset, *from_slot as u64, 8);
        write_bits(&mut buf, &mut offset, *to_inventory as u64, 8);
        write_bits(&mut buf, &mut offset, *to_slot as u64, 8);
        count += 1;
        *index += 1;
    }

    let mut tag_offset = 0;
    write_bits(&mut buf, &mut tag_offset, 1, 8);
    let mut count_offset = 8;
    write_bits(&mut buf, &mut count_offset, count, 4);
    Felt(buf)
}

/// Kind 2: a run of self-describing simple actions. Packing stops at an
/// incompatible action or when the capacity margin would be crossed.
fn pack_kind2(actions: &[Action], index: &mut usize) -> Felt {
    let mut buf = [0u8; FELT_BYTES];
    let mut offset = 16; // tag(8) + count(8)

    let mut count = 0u64;
    while *index < actions.len() {
        let action = &actions[*index];
        let Some(payload_bits) = action.simple_payload_bits() else {
            break;
        };
        if offset + 8 + payload_bits > FELT_BITS - KIND2_MARGIN_BITS {
            break;
        }
        write_bits(&mut buf, &mut offset, action.action_type() as u64, 8);
        match action {
            Action::SelectHotbar { slot } => write_bits(&mut buf, &mut offset, *slot as u64, 8),
            Action::Visit { space_id } => write_bits(&mut buf, &mut offset, *space_id as u64, 16),
            Action::Sell | Action::CancelProcess | Action::VisitNewIsland => {}
            _ => unreachable!("non-simple action in kind-2 run"),
        }
        count += 1;
        *index += 1;
    }

    let mut tag_offset = 0;
    write_bits(&mut buf, &mut tag_offset, 2, 8);
    let mut count_offset = 8;
    write_bits(&mut buf, &mut count_offset, count, 8);
    Felt(buf)
}

/// Kind 3: exactly one large action per word.
fn pack_kind3(action: &Action) -> Felt {
    let mut buf = [0u8; FELT_BYTES];
    let mut offset = 0;
    write_bits(&mut buf, &mut offset, 3, 8);
    write_bits(&mut buf, &mut offset, action.action_type() as u64, 8);

    match action {
        Action::Craft { item } => {
            write_bits(&mut buf, &mut offset, *item as u64, 32);
        }
        Action::StartProcess {
            process,
            input_amount,
        } => {
            write_bits(&mut buf, &mut offset, *process as u64, 8);
            write_bits(&mut buf, &mut offset, *input_amount as u64, 32);
        }
        Action::Buy {
            item_ids,
            quantities,
        } => {
            let pairs = item_ids.len().min(quantities.len());
            write_bits(&mut buf, &mut offset, pairs as u64, 8);
            for i in 0..pairs {
                write_bits(&mut buf, &mut offset, item_ids[i] as u64, 16);
                write_bits(&mut buf, &mut offset, quantities[i] as u64, 16);
            }
        }
        Action::GenerateIsland => {}
        other => {
            // Batchable actions reach here only if the caller bypassed
            // encode_actions; emit them as a degenerate one-entry word.
            log::warn!("kind-3 fallback for batchable action {:?}", other.action_type());
        }
    }
    Felt(buf)
}

/// Decoded view of one Kind-0 entry, used by tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedEntry {
    pub is_hit: bool,
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

/// Decode a Kind-0 word back into its entries. Returns `None` when the kind
/// tag is not 0.
pub fn decode_kind0(word: &Felt) -> Option<Vec<PlacedEntry>> {
    let mut offset = 0;
    if read_bits(word, &mut offset, 8) != 0 {
        return None;
    }
    let count = read_bits(word, &mut offset, 4);
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let is_hit = read_bits(word, &mut offset, 1) == 1;
        let x = read_bits(word, &mut offset, 14) as u16;
        let y = read_bits(word, &mut offset, 14) as u16;
        let z = read_bits(word, &mut offset, 1) as u8;
        entries.push(PlacedEntry { is_hit, x, y, z });
    }
    Some(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
