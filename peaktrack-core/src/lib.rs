//! PeakTrack Core — trailing stop-loss tracking for open trading positions.
//!
//! This crate contains the heart of the tracker:
//! - Fixed-point decimal arithmetic for all price and quantity math
//! - Domain types (positions, identifiers, token metadata)
//! - The peak price index: positions grouped by their highest observed
//!   price, merged and trigger-evaluated on every tick
//! - Diff-based persistence: only what changed since the last successful
//!   flush is written to the key/value store
//! - The per-token-pair tracker that wires index and persistence together

pub mod decimal;
pub mod domain;
pub mod index;
pub mod persistence;
pub mod tracker;

pub use decimal::{DecimalAmount, DecimalError, ParseAmountError};
pub use domain::{Position, PositionId, PositionStatus, PositionType, TokenInfo};
pub use index::PeakPriceIndex;
pub use persistence::{JsonFileStore, KvStore, MemoryStore, StoreError};
pub use tracker::{FlushStats, PeakPriceTracker};
