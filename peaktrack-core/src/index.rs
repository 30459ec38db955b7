//! Peak price index.
//!
//! Groups open positions by the highest price observed since they opened.
//! On each price update, every group whose peak is below the new price is
//! merged into the group at the new price (the new price is now those
//! positions' peak), and every surviving group is checked for positions
//! whose decline from peak meets their trigger percent.
//!
//! Slots inside a group are optionals and are never compacted: a slot's
//! index is part of its storage key, so a removed position leaves a hole
//! until the diffing layer deletes the key.

use crate::decimal::DecimalAmount;
use crate::domain::{Position, PositionId, PositionStatus};
use std::collections::BTreeMap;
use tracing::debug;

/// Decimal places used when computing the fractional decline from peak.
pub const TRIGGER_DECIMAL_PLACES: u32 = 9;

/// Peak price -> sparse slots of positions holding that peak.
pub type PeakGroups = BTreeMap<DecimalAmount, Vec<Option<Position>>>;

/// Index of open positions grouped by peak price.
#[derive(Debug, Clone, Default)]
pub struct PeakPriceIndex {
    groups: PeakGroups,
}

impl PeakPriceIndex {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    /// Rebuild an index from already-grouped slots (storage load path).
    pub fn from_groups(groups: PeakGroups) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &PeakGroups {
        &self.groups
    }

    /// Number of distinct peak price groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of live (non-null) positions across all groups.
    pub fn position_count(&self) -> usize {
        self.groups
            .values()
            .map(|slots| slots.iter().flatten().count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.position_count() == 0
    }

    /// Iterate over live positions with their current peak price.
    pub fn iter_positions(&self) -> impl Iterator<Item = (&DecimalAmount, &Position)> {
        self.groups
            .iter()
            .flat_map(|(peak, slots)| slots.iter().flatten().map(move |p| (peak, p)))
    }

    /// Append a position to the group at `price`, creating the group if
    /// absent. The position's slot index is stable from here on.
    pub fn add(&mut self, price: DecimalAmount, position: Position) {
        self.groups.entry(price).or_default().push(Some(position));
    }

    /// Flip a position's status to `Closing` in place.
    ///
    /// The position stays indexed (so a later price update cannot re-trigger
    /// it while its sell order is in flight) but becomes invisible to
    /// trigger evaluation. Unknown ids are a no-op.
    pub fn mark_as_closing(&mut self, position_id: &PositionId) -> bool {
        for slots in self.groups.values_mut() {
            for slot in slots.iter_mut() {
                if let Some(position) = slot {
                    if &position.position_id == position_id {
                        position.status = PositionStatus::Closing;
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Null out a position's slot, keeping the slot index stable for the
    /// diffing layer. Unknown ids are a no-op.
    pub fn remove(&mut self, position_id: &PositionId) -> Option<Position> {
        for slots in self.groups.values_mut() {
            for slot in slots.iter_mut() {
                if slot
                    .as_ref()
                    .is_some_and(|p| &p.position_id == position_id)
                {
                    return slot.take();
                }
            }
        }
        None
    }

    /// Fold a new price observation into the index and return the positions
    /// it triggers.
    ///
    /// Groups whose peak is below `new_price` are stale: their non-null
    /// positions are concatenated in ascending-peak order and appended to
    /// the group at `new_price` (created if needed). Trigger evaluation
    /// runs after the merge, so a position whose peak was just raised sees a
    /// decline of zero this tick.
    ///
    /// The index never removes triggered positions itself; the caller
    /// decides what to do with them.
    pub fn update(&mut self, new_price: &DecimalAmount) -> Vec<Position> {
        self.merge_stale_groups(new_price);
        self.collect_triggered(new_price)
    }

    fn merge_stale_groups(&mut self, new_price: &DecimalAmount) {
        let stale: Vec<DecimalAmount> = self
            .groups
            .range(..new_price)
            .map(|(peak, _)| peak.clone())
            .collect();
        if stale.is_empty() {
            return;
        }
        let mut merged: Vec<Position> = Vec::new();
        for peak in &stale {
            if let Some(slots) = self.groups.remove(peak) {
                merged.extend(slots.into_iter().flatten());
            }
        }
        debug!(
            stale_groups = stale.len(),
            positions = merged.len(),
            new_peak = %new_price,
            "merged stale peak groups"
        );
        if !merged.is_empty() {
            self.groups
                .entry(new_price.clone())
                .or_default()
                .extend(merged.into_iter().map(Some));
        }
    }

    fn collect_triggered(&self, new_price: &DecimalAmount) -> Vec<Position> {
        let mut triggered = Vec::new();
        for (peak, slots) in &self.groups {
            // Post-merge every peak is >= new_price, so the decline is
            // never negative. A zero peak cannot produce a decline; skip.
            let Ok(decline) =
                (peak - new_price).checked_div(peak, TRIGGER_DECIMAL_PLACES)
            else {
                continue;
            };
            for position in slots.iter().flatten() {
                if !position.is_trigger_candidate() {
                    continue;
                }
                let Some(threshold) = trigger_fraction(position.trigger_percent) else {
                    continue;
                };
                if decline >= threshold {
                    triggered.push(position.clone());
                }
            }
        }
        if !triggered.is_empty() {
            debug!(count = triggered.len(), price = %new_price, "positions hit trailing stop");
        }
        triggered
    }
}

/// `trigger_percent / 100` as a decimal fraction, at the same precision the
/// decline is computed with. `None` for non-finite percents.
fn trigger_fraction(trigger_percent: f64) -> Option<DecimalAmount> {
    let percent = DecimalAmount::from_f64(trigger_percent).ok()?;
    percent
        .checked_div(&DecimalAmount::from_int(100), TRIGGER_DECIMAL_PLACES)
        .ok()
}
