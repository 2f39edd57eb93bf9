//! Integration tests for the packed-word encoder, exercised through the
//! crate's public API the way the queue uses it.

use island_bridge::codec::{decode_kind0, read_bits};
use island_bridge::{encode_actions, Action, BlockPos};

fn place(x: i32, y: i32) -> Action {
    Action::PlaceUse {
        position: BlockPos::new(x, y, 0),
    }
}

#[test]
fn burst_of_placements_plus_move_packs_into_two_words() {
    let mut actions: Vec<Action> = (0..5).map(|i| place(8192 + i, 8192)).collect();
    actions.push(Action::MoveItem {
        from_inventory: 0,
        from_slot: 0,
        to_inventory: 0,
        to_slot: 9,
    });

    let words = encode_actions(&actions);
    assert_eq!(words.len(), 2);

    let entries = decode_kind0(&words[0]).expect("first word is kind 0");
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].x, 8192);
    assert_eq!(entries[4].x, 8196);
    assert!(entries.iter().all(|e| !e.is_hit));

    let mut offset = 0;
    assert_eq!(read_bits(&words[1], &mut offset, 8), 1); // kind 1 tag
    assert_eq!(read_bits(&words[1], &mut offset, 4), 1); // one move
    assert_eq!(read_bits(&words[1], &mut offset, 8), 0);
    assert_eq!(read_bits(&words[1], &mut offset, 8), 0);
    assert_eq!(read_bits(&words[1], &mut offset, 8), 0);
    assert_eq!(read_bits(&words[1], &mut offset, 8), 9);
}

#[test]
fn encoded_words_render_as_chain_call_hex() {
    let words = encode_actions(&[place(8192, 8192)]);
    let hex = words[0].to_hex();
    assert!(hex.starts_with("0x"));
    // Low byte is the kind tag (0), so the string ends in "00".
    assert!(hex.ends_with("00"));
}

#[test]
fn interleaved_kinds_stay_in_submission_order() {
    let actions = vec![
        Action::Sell,
        place(8192, 8192),
        Action::Hit {
            position: BlockPos::new(8193, 8192, 0),
        },
        Action::Sell,
    ];
    let words = encode_actions(&actions);
    assert_eq!(words.len(), 3);

    let kind = |i: usize| {
        let mut offset = 0;
        read_bits(&words[i], &mut offset, 8)
    };
    assert_eq!(kind(0), 2);
    assert_eq!(kind(1), 0);
    assert_eq!(kind(2), 2);

    // The place and the hit share the middle word.
    let entries = decode_kind0(&words[1]).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].is_hit);
    assert!(entries[1].is_hit);
}

#[test]
fn empty_batch_encodes_to_nothing() {
    assert!(encode_actions(&[]).is_empty());
}
