//! Position domain types.

use crate::decimal::DecimalAmount;
use crate::domain::ids::PositionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of automatic position management applied to a holding.
///
/// Only long trailing stop-loss positions are evaluated for triggers; any
/// other kind is carried through the index untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionType {
    /// Sell automatically once price falls a configured percent below the
    /// highest price observed since the position opened.
    LongTrailingStopLoss,
}

/// Lifecycle state of a position.
///
/// `Unfilled -> Open -> Closing -> Closed`. Only `Open` positions are
/// peak-tracked and trigger-evaluated; `Closing` and `Closed` positions are
/// frozen until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Unfilled,
    Open,
    Closing,
    Closed,
}

/// Token metadata carried on both legs of a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(address: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// An open trading position in a single token / vs-token pair.
///
/// `PartialEq` is derived, which compares every field; the diffing
/// persistence layer relies on that structural equality to decide whether a
/// stored slot needs rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub position_type: PositionType,
    pub status: PositionStatus,
    pub token: TokenInfo,
    pub vs_token: TokenInfo,
    /// Quantity of `token` held.
    pub token_amt: DecimalAmount,
    /// Quantity of `vs_token` originally spent.
    pub vs_token_amt: DecimalAmount,
    /// Price at which the buy filled. If slippage produced multiple fill
    /// prices, this is the highest; it seeds the peak.
    pub fill_price: DecimalAmount,
    /// Percent drop from peak (0-100) that triggers the automatic sell.
    pub trigger_percent: f64,
    /// Slippage tolerance for the closing sell, in percent.
    pub sell_slippage_percent: f64,
    /// Whether the closing sell is re-submitted when slippage is exceeded.
    pub retry_sell_if_slippage_exceeded: bool,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Whether trigger evaluation should consider this position at all.
    pub fn is_trigger_candidate(&self) -> bool {
        self.status == PositionStatus::Open
            && self.position_type == PositionType::LongTrailingStopLoss
    }
}
