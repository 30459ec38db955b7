//! Position tracker for a single token pair.
//!
//! Owns the peak price index and the snapshot buffer, and exposes the
//! contract the order-execution side drives: add a filled position, fold in
//! a price tick, mark triggered positions closing, remove confirmed sells,
//! and flush the difference since the last successful flush to storage.
//!
//! The tracker is single-owner state: the caller serializes operations
//! (one price tick, add, or removal at a time), so there are no locks here.

use crate::decimal::DecimalAmount;
use crate::domain::{Position, PositionId, PositionStatus};
use crate::index::{PeakGroups, PeakPriceIndex};
use crate::persistence::{compute_delta, load_groups, KvStore, StoreError};
use tracing::{debug, info};

/// Counts of storage writes issued by a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    pub puts: usize,
    pub deletes: usize,
}

impl FlushStats {
    pub fn is_noop(&self) -> bool {
        self.puts == 0 && self.deletes == 0
    }
}

/// Tracks open trailing stop-loss positions for one token pair.
#[derive(Debug, Clone)]
pub struct PeakPriceTracker {
    prefix: String,
    index: PeakPriceIndex,
    /// Deep copy of the groups as of the last successful flush; consulted
    /// only by the diff computation, never by trigger evaluation.
    buffer: PeakGroups,
}

impl PeakPriceTracker {
    /// Create an empty tracker whose storage keys carry `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index: PeakPriceIndex::new(),
            buffer: PeakGroups::new(),
        }
    }

    /// Create a tracker from a full storage scan.
    pub fn load(prefix: impl Into<String>, store: &dyn KvStore) -> Result<Self, StoreError> {
        let mut tracker = Self::new(prefix);
        tracker.initialize(store.list()?);
        Ok(tracker)
    }

    pub fn storage_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn index(&self) -> &PeakPriceIndex {
        &self.index
    }

    /// Track a filled position. Its peak starts at the fill price and its
    /// status becomes `Open` regardless of what the fill pipeline left it at.
    pub fn add(&mut self, mut position: Position) {
        position.status = PositionStatus::Open;
        let fill_price = position.fill_price.clone();
        info!(
            position_id = %position.position_id,
            fill_price = %fill_price,
            trigger_percent = position.trigger_percent,
            "tracking new position"
        );
        self.index.add(fill_price, position);
    }

    /// Fold in a price tick; returns the newly triggered positions.
    ///
    /// The caller owns what happens next: typically mark each returned
    /// position closing right away (so the next tick cannot re-trigger it)
    /// and remove it once the sell is confirmed. The tracker itself removes
    /// nothing here.
    pub fn update(&mut self, new_price: &DecimalAmount) -> Vec<Position> {
        self.index.update(new_price)
    }

    /// Freeze a position while its sell order is in flight. Unknown ids are
    /// a no-op, so callers may retry.
    pub fn mark_as_closing(&mut self, position_id: &PositionId) -> bool {
        self.index.mark_as_closing(position_id)
    }

    /// Drop a position from tracking. Its storage key is deleted on the
    /// next successful flush. Unknown ids are a no-op.
    pub fn remove(&mut self, position_id: &PositionId) -> Option<Position> {
        self.index.remove(position_id)
    }

    /// Write everything that changed since the last successful flush.
    ///
    /// On any storage failure the buffer stays put and the in-memory state
    /// remains authoritative, so the next call recomputes and re-issues the
    /// entire outstanding delta; retrying is always safe.
    pub fn flush_to_storage(&mut self, store: &mut dyn KvStore) -> Result<FlushStats, StoreError> {
        let delta = compute_delta(&self.prefix, self.index.groups(), &self.buffer)?;
        let stats = FlushStats {
            puts: delta.puts.len(),
            deletes: delta.deletes.len(),
        };
        if stats.is_noop() {
            debug!(prefix = %self.prefix, "nothing to flush");
            return Ok(stats);
        }
        if !delta.puts.is_empty() {
            store.put(delta.puts)?;
        }
        if !delta.deletes.is_empty() {
            store.delete(&delta.deletes)?;
        }
        self.buffer = self.index.groups().clone();
        info!(
            prefix = %self.prefix,
            puts = stats.puts,
            deletes = stats.deletes,
            "flushed position state"
        );
        Ok(stats)
    }

    /// Replace in-memory state with a parsed storage scan.
    ///
    /// The buffer is set to a copy of the loaded state immediately, so the
    /// next flush of an untouched tracker writes nothing.
    pub fn initialize(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        let groups = load_groups(&self.prefix, entries);
        info!(
            prefix = %self.prefix,
            groups = groups.len(),
            "initialized tracker from storage"
        );
        self.index = PeakPriceIndex::from_groups(groups);
        self.buffer = self.index.groups().clone();
    }
}
