//! Snapshot diffing.
//!
//! The tracker keeps a deep copy of its groups as of the last successful
//! flush. [`compute_delta`] reconciles the live groups against that buffer
//! and emits the minimal set of puts and deletes; [`load_groups`] rebuilds
//! groups from a raw storage scan.

use crate::decimal::DecimalAmount;
use crate::domain::Position;
use crate::index::PeakGroups;
use crate::persistence::key::StorageKey;
use crate::persistence::store::StoreError;
use std::collections::BTreeMap;
use tracing::warn;

/// The storage writes required to bring a store in line with live state.
#[derive(Debug, Default)]
pub struct StorageDelta {
    pub puts: BTreeMap<String, String>,
    pub deletes: Vec<String>,
}

impl StorageDelta {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Diff live groups against the last-flushed buffer.
///
/// Slot comparison is structural: a position mutated in place (a status
/// flip, say) produces a put even though it is the same allocation the
/// buffer copy was cloned from.
pub fn compute_delta(
    prefix: &str,
    current: &PeakGroups,
    buffer: &PeakGroups,
) -> Result<StorageDelta, StoreError> {
    let mut delta = StorageDelta::default();

    for (price, slots) in current {
        match buffer.get(price) {
            None => {
                // Group is new since the last flush: every live slot is a put.
                for (slot, position) in slots.iter().enumerate() {
                    if let Some(position) = position {
                        put(&mut delta, prefix, price, slot, position)?;
                    }
                }
            }
            Some(old_slots) => {
                for slot in 0..slots.len().max(old_slots.len()) {
                    let live = slots.get(slot).and_then(Option::as_ref);
                    let flushed = old_slots.get(slot).and_then(Option::as_ref);
                    match (live, flushed) {
                        (Some(a), Some(b)) if a == b => {}
                        (Some(a), _) => put(&mut delta, prefix, price, slot, a)?,
                        (None, Some(_)) => {
                            delta.deletes.push(StorageKey::encode(prefix, price, slot));
                        }
                        (None, None) => {}
                    }
                }
            }
        }
    }

    for (price, old_slots) in buffer {
        if current.contains_key(price) {
            continue;
        }
        // Group disappeared (merged away or emptied): delete its slots.
        for (slot, position) in old_slots.iter().enumerate() {
            if position.is_some() {
                delta.deletes.push(StorageKey::encode(prefix, price, slot));
            }
        }
    }

    Ok(delta)
}

fn put(
    delta: &mut StorageDelta,
    prefix: &str,
    price: &DecimalAmount,
    slot: usize,
    position: &Position,
) -> Result<(), StoreError> {
    let key = StorageKey::encode(prefix, price, slot);
    delta.puts.insert(key, serde_json::to_string(position)?);
    Ok(())
}

/// Rebuild peak groups from a raw storage scan.
///
/// Entries may arrive in any order; slots land at their encoded index with
/// holes padded by `None`, never reordered or compacted. Keys that carry a
/// foreign prefix or fail to parse are skipped with a warning rather than
/// failing the load.
pub fn load_groups(
    prefix: &str,
    entries: impl IntoIterator<Item = (String, String)>,
) -> PeakGroups {
    let mut groups = PeakGroups::new();
    for (raw_key, raw_value) in entries {
        let key = match StorageKey::decode(&raw_key, prefix) {
            Ok(key) => key,
            Err(err) => {
                warn!(key = %raw_key, %err, "skipping unrecognized storage key");
                continue;
            }
        };
        let position: Position = match serde_json::from_str(&raw_value) {
            Ok(position) => position,
            Err(err) => {
                warn!(key = %raw_key, %err, "skipping undecodable stored position");
                continue;
            }
        };
        let slots = groups.entry(key.price).or_default();
        if slots.len() <= key.slot {
            slots.resize(key.slot + 1, None);
        }
        slots[key.slot] = Some(position);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::DecimalAmount;
    use crate::domain::{PositionId, PositionStatus, PositionType, TokenInfo};
    use chrono::{DateTime, Utc};

    const PREFIX: &str = "positions|TOK|USDC";

    fn amt(s: &str) -> DecimalAmount {
        s.parse().unwrap()
    }

    fn position(id: &str) -> Position {
        Position {
            position_id: PositionId::new(id),
            position_type: PositionType::LongTrailingStopLoss,
            status: PositionStatus::Open,
            token: TokenInfo::new("tok", "TOK", 9),
            vs_token: TokenInfo::new("usdc", "USDC", 6),
            token_amt: amt("4.0"),
            vs_token_amt: amt("1000"),
            fill_price: amt("250"),
            trigger_percent: 10.0,
            sell_slippage_percent: 0.5,
            retry_sell_if_slippage_exceeded: false,
            opened_at: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn groups(entries: &[(&str, Vec<Option<Position>>)]) -> PeakGroups {
        entries
            .iter()
            .map(|(price, slots)| (amt(price), slots.clone()))
            .collect()
    }

    #[test]
    fn identical_states_produce_empty_delta() {
        let current = groups(&[("250", vec![Some(position("a"))])]);
        let delta = compute_delta(PREFIX, &current, &current.clone()).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn new_group_puts_every_live_slot() {
        let current = groups(&[("250", vec![Some(position("a")), None, Some(position("b"))])]);
        let delta = compute_delta(PREFIX, &current, &PeakGroups::new()).unwrap();
        assert_eq!(delta.deletes.len(), 0);
        assert_eq!(
            delta.puts.keys().collect::<Vec<_>>(),
            vec!["positions|TOK|USDC:250~0:0", "positions|TOK|USDC:250~0:2"]
        );
    }

    #[test]
    fn mutated_slot_becomes_a_put() {
        let buffer = groups(&[("250", vec![Some(position("a"))])]);
        let mut current = buffer.clone();
        current.get_mut(&amt("250")).unwrap()[0]
            .as_mut()
            .unwrap()
            .status = PositionStatus::Closing;

        let delta = compute_delta(PREFIX, &current, &buffer).unwrap();
        assert_eq!(delta.puts.len(), 1);
        assert!(delta.deletes.is_empty());
    }

    #[test]
    fn nulled_slot_becomes_a_delete() {
        let buffer = groups(&[("250", vec![Some(position("a")), Some(position("b"))])]);
        let mut current = buffer.clone();
        current.get_mut(&amt("250")).unwrap()[0] = None;

        let delta = compute_delta(PREFIX, &current, &buffer).unwrap();
        assert!(delta.puts.is_empty());
        assert_eq!(delta.deletes, vec!["positions|TOK|USDC:250~0:0"]);
    }

    #[test]
    fn removed_group_deletes_only_live_slots() {
        let buffer = groups(&[("250", vec![Some(position("a")), None, Some(position("b"))])]);
        let delta = compute_delta(PREFIX, &PeakGroups::new(), &buffer).unwrap();
        assert!(delta.puts.is_empty());
        assert_eq!(
            delta.deletes,
            vec!["positions|TOK|USDC:250~0:0", "positions|TOK|USDC:250~0:2"]
        );
    }

    #[test]
    fn appended_slot_beyond_buffer_length_is_a_put() {
        let buffer = groups(&[("250", vec![Some(position("a"))])]);
        let mut current = buffer.clone();
        current
            .get_mut(&amt("250"))
            .unwrap()
            .push(Some(position("b")));

        let delta = compute_delta(PREFIX, &current, &buffer).unwrap();
        assert_eq!(
            delta.puts.keys().collect::<Vec<_>>(),
            vec!["positions|TOK|USDC:250~0:1"]
        );
        assert!(delta.deletes.is_empty());
    }

    #[test]
    fn truncation_beyond_current_length_is_a_delete() {
        let buffer = groups(&[("250", vec![Some(position("a")), Some(position("b"))])]);
        let current = groups(&[("250", vec![Some(position("a"))])]);

        let delta = compute_delta(PREFIX, &current, &buffer).unwrap();
        assert!(delta.puts.is_empty());
        assert_eq!(delta.deletes, vec!["positions|TOK|USDC:250~0:1"]);
    }

    #[test]
    fn merge_shows_up_as_moves() {
        // 280 and 290 merged into 300: old keys deleted, new keys put.
        let buffer = groups(&[
            ("280", vec![Some(position("a"))]),
            ("290", vec![Some(position("b"))]),
        ]);
        let current = groups(&[("300", vec![Some(position("a")), Some(position("b"))])]);

        let delta = compute_delta(PREFIX, &current, &buffer).unwrap();
        assert_eq!(delta.puts.len(), 2);
        assert_eq!(delta.deletes.len(), 2);
    }

    #[test]
    fn load_rebuilds_sparse_out_of_order_slots() {
        let a = position("a");
        let b = position("b");
        let entries = vec![
            (
                StorageKey::encode(PREFIX, &amt("250"), 2),
                serde_json::to_string(&b).unwrap(),
            ),
            (
                StorageKey::encode(PREFIX, &amt("250"), 0),
                serde_json::to_string(&a).unwrap(),
            ),
        ];

        let groups = load_groups(PREFIX, entries);
        let slots = &groups[&amt("250")];
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], Some(a));
        assert_eq!(slots[1], None);
        assert_eq!(slots[2], Some(b));
    }

    #[test]
    fn load_skips_foreign_and_malformed_entries() {
        let entries = vec![
            ("other:250~0:0".to_string(), "{}".to_string()),
            (
                StorageKey::encode(PREFIX, &amt("250"), 0),
                "not json".to_string(),
            ),
            (
                StorageKey::encode(PREFIX, &amt("300"), 0),
                serde_json::to_string(&position("ok")).unwrap(),
            ),
        ];

        let groups = load_groups(PREFIX, entries);
        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key(&amt("300")));
    }

    #[test]
    fn round_trip_through_delta_and_load() {
        let current = groups(&[
            ("250", vec![Some(position("a")), None, Some(position("b"))]),
            ("300", vec![Some(position("c"))]),
        ]);
        let delta = compute_delta(PREFIX, &current, &PeakGroups::new()).unwrap();
        let reloaded = load_groups(PREFIX, delta.puts.into_iter());

        // Holes at the tail are not stored, so compare live slots only.
        assert_eq!(reloaded.len(), current.len());
        for (price, slots) in &current {
            let reloaded_slots = &reloaded[price];
            for (i, slot) in slots.iter().enumerate() {
                assert_eq!(reloaded_slots.get(i).and_then(Option::as_ref), slot.as_ref());
            }
        }
    }
}
