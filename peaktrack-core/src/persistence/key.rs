//! Typed storage keys.
//!
//! Stored entries are keyed `<prefix>:<priceKey>:<slot>`, where `priceKey`
//! is the canonical [`DecimalAmount`] encoding and `slot` is the position's
//! stable index inside its peak group. Encoding and decoding live here so
//! the rest of the crate never string-splits a raw key.

use crate::decimal::{DecimalAmount, ParseAmountError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key {key:?} does not carry prefix {expected:?}")]
    PrefixMismatch { key: String, expected: String },

    #[error("key {0:?} is missing its slot segment")]
    MissingSlot(String),

    #[error("bad price in key {key:?}: {source}")]
    InvalidPrice {
        key: String,
        source: ParseAmountError,
    },

    #[error("bad slot in key {0:?}")]
    InvalidSlot(String),
}

/// A decoded storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    pub price: DecimalAmount,
    pub slot: usize,
}

impl StorageKey {
    /// Render the raw key for a slot under a peak price.
    pub fn encode(prefix: &str, price: &DecimalAmount, slot: usize) -> String {
        format!("{prefix}:{}:{slot}", price.to_key())
    }

    /// Parse a raw key, verifying it belongs to `prefix`.
    pub fn decode(raw: &str, prefix: &str) -> Result<Self, KeyError> {
        let rest = raw
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| KeyError::PrefixMismatch {
                key: raw.to_string(),
                expected: prefix.to_string(),
            })?;
        let (price, slot) = rest
            .split_once(':')
            .ok_or_else(|| KeyError::MissingSlot(raw.to_string()))?;
        let price = DecimalAmount::from_key(price).map_err(|source| KeyError::InvalidPrice {
            key: raw.to_string(),
            source,
        })?;
        let slot = slot
            .parse::<usize>()
            .map_err(|_| KeyError::InvalidSlot(raw.to_string()))?;
        Ok(Self { price, slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> DecimalAmount {
        s.parse().unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let raw = StorageKey::encode("positions|TOK|USDC", &amt("250"), 3);
        assert_eq!(raw, "positions|TOK|USDC:250~0:3");
        let key = StorageKey::decode(&raw, "positions|TOK|USDC").unwrap();
        assert_eq!(key.price, amt("250"));
        assert_eq!(key.slot, 3);
    }

    #[test]
    fn encode_normalizes_the_price_segment() {
        // The same value at different scales produces the same raw key.
        assert_eq!(
            StorageKey::encode("p", &amt("250.00"), 0),
            StorageKey::encode("p", &amt("250"), 0),
        );
    }

    #[test]
    fn decode_rejects_foreign_prefix() {
        let raw = StorageKey::encode("other", &amt("250"), 0);
        assert!(matches!(
            StorageKey::decode(&raw, "mine"),
            Err(KeyError::PrefixMismatch { .. })
        ));
    }

    #[test]
    fn decode_requires_exact_prefix_boundary() {
        // "mine2" starts with "mine" but is a different prefix.
        assert!(matches!(
            StorageKey::decode("mine2:250~0:0", "mine"),
            Err(KeyError::PrefixMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_malformed_segments() {
        assert!(matches!(
            StorageKey::decode("p:250~0", "p"),
            Err(KeyError::MissingSlot(_))
        ));
        assert!(matches!(
            StorageKey::decode("p:banana:0", "p"),
            Err(KeyError::InvalidPrice { .. })
        ));
        assert!(matches!(
            StorageKey::decode("p:250~0:x", "p"),
            Err(KeyError::InvalidSlot(_))
        ));
    }
}
