//! Fixed-point decimal amounts.
//!
//! A [`DecimalAmount`] is an arbitrary-precision signed integer plus a
//! non-negative scale, representing `unscaled * 10^-scale`. All price and
//! quantity math in the tracker goes through this type; floating point never
//! decides a comparison.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing decimal amounts from strings or keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("empty amount string")]
    Empty,

    #[error("invalid digits in amount: {0:?}")]
    InvalidDigits(String),

    #[error("amount key missing '~' separator: {0:?}")]
    MissingSeparator(String),

    #[error("invalid scale in amount key: {0:?}")]
    InvalidScale(String),

    #[error("non-finite number cannot become an amount")]
    NonFinite,
}

/// Fixed-point decimal value: `unscaled * 10^-scale`.
///
/// Equality and ordering are by numeric value, not by representation:
/// `1.10` (unscaled 110, scale 2) equals `1.1` (unscaled 11, scale 1).
/// That invariant is what allows `DecimalAmount` to key the peak price
/// index without numerically-equal prices fragmenting into separate groups.
#[derive(Debug, Clone)]
pub struct DecimalAmount {
    unscaled: BigInt,
    scale: u32,
}

impl DecimalAmount {
    /// Build an amount from an unscaled integer and a scale.
    pub fn new(unscaled: BigInt, scale: u32) -> Self {
        Self { unscaled, scale }
    }

    /// Zero at scale 0.
    pub fn zero() -> Self {
        Self {
            unscaled: BigInt::zero(),
            scale: 0,
        }
    }

    /// A whole number at scale 0.
    pub fn from_int(value: i64) -> Self {
        Self {
            unscaled: BigInt::from(value),
            scale: 0,
        }
    }

    /// Convert an `f64` through its shortest round-trip decimal rendering.
    ///
    /// `0.1` becomes exactly one tenth, not the nearest binary fraction.
    /// Non-finite input is rejected.
    pub fn from_f64(value: f64) -> Result<Self, ParseAmountError> {
        if !value.is_finite() {
            return Err(ParseAmountError::NonFinite);
        }
        // Rust's Display for f64 is always positional (never exponential)
        // and round-trips, so parsing it back is lossless.
        value.to_string().parse()
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.unscaled.is_negative()
    }

    /// The same value re-expressed at a larger (or equal) scale.
    pub(crate) fn rescaled_up(&self, scale: u32) -> BigInt {
        debug_assert!(scale >= self.scale, "rescaled_up only grows the scale");
        &self.unscaled * pow10(scale - self.scale)
    }

    /// Canonical `(unscaled, scale)` pair: trailing fractional zeros are
    /// stripped and zero collapses to scale 0, so numerically-equal values
    /// normalize identically.
    fn normalized_parts(&self) -> (BigInt, u32) {
        if self.unscaled.is_zero() {
            return (BigInt::zero(), 0);
        }
        let mut unscaled = self.unscaled.clone();
        let mut scale = self.scale;
        let ten = BigInt::from(10);
        while scale > 0 && (&unscaled % &ten).is_zero() {
            unscaled /= &ten;
            scale -= 1;
        }
        (unscaled, scale)
    }

    /// Canonical string encoding: `"<unscaled>~<scale>"` after
    /// normalization. Numerically-equal amounts always encode identically,
    /// which makes the encoding safe to embed in storage keys.
    pub fn to_key(&self) -> String {
        let (unscaled, scale) = self.normalized_parts();
        format!("{}~{}", unscaled, scale)
    }

    /// Decode a key produced by [`DecimalAmount::to_key`].
    pub fn from_key(key: &str) -> Result<Self, ParseAmountError> {
        let (unscaled, scale) = key
            .split_once('~')
            .ok_or_else(|| ParseAmountError::MissingSeparator(key.to_string()))?;
        let unscaled = unscaled
            .parse::<BigInt>()
            .map_err(|_| ParseAmountError::InvalidDigits(unscaled.to_string()))?;
        let scale = scale
            .parse::<u32>()
            .map_err(|_| ParseAmountError::InvalidScale(scale.to_string()))?;
        Ok(Self { unscaled, scale })
    }

    /// Plain positional rendering, e.g. `-0.0000444`.
    pub fn to_plain_string(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.unscaled.magnitude().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            format!("{sign}{digits}")
        } else if digits.len() <= scale {
            format!("{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        } else {
            let (whole, frac) = digits.split_at(digits.len() - scale);
            format!("{sign}{whole}.{frac}")
        }
    }

    /// Human-readable rendering.
    ///
    /// Long runs of leading fractional zeros collapse into subscript
    /// notation (`0.0000444` renders as `0.0₄444`), trailing zeros are
    /// trimmed, the significant digits are rounded to `max_sig_figs`, and
    /// the whole part is comma-grouped.
    pub fn to_friendly_string(&self, max_sig_figs: usize) -> String {
        let plain = self.to_plain_string();
        let Some((whole, frac)) = plain.split_once('.') else {
            let (sign, digits) = split_sign(&plain);
            return format!("{sign}{}", group_thousands(digits));
        };
        let (sign, whole) = split_sign(whole);
        let (zeros, rest) = split_leading_zeros(frac);
        let mut rest = rest.trim_end_matches('0').to_string();
        let mut zeros = zeros.to_string();

        // Many zeros between the decimal point and significant digits
        // become 0 plus a subscript count, e.g. "0.0₄444".
        if zeros.len() > 1 && whole == "0" && !rest.is_empty() {
            zeros = format!("0{}", subscript_number(zeros.len()));
        }
        // Nothing but zeros after the point collapses to a single zero.
        if zeros.len() > 1 && rest.is_empty() {
            zeros = "0".to_string();
        }
        if rest.len() > max_sig_figs {
            rest = round_digits(&rest, max_sig_figs);
        }
        format!("{sign}{}.{zeros}{rest}", group_thousands(whole))
    }
}

impl PartialEq for DecimalAmount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DecimalAmount {}

impl PartialOrd for DecimalAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecimalAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.rescaled_up(scale).cmp(&other.rescaled_up(scale))
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

impl FromStr for DecimalAmount {
    type Err = ParseAmountError;

    /// Parse a plain decimal literal such as `250`, `-0.075`, or `1.50`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, body) = match s.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, s),
        };
        if body.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let digits: String = [whole, frac].concat();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError::InvalidDigits(s.to_string()));
        }
        let unscaled = digits
            .parse::<BigInt>()
            .map_err(|_| ParseAmountError::InvalidDigits(s.to_string()))?;
        Ok(Self {
            unscaled: unscaled * sign,
            scale: frac.len() as u32,
        })
    }
}

impl Serialize for DecimalAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_key())
    }
}

impl<'de> Deserialize<'de> for DecimalAmount {
    /// Accepts the canonical key form (`"250~0"`) written by `Serialize`
    /// as well as plain decimal literals (`"250"`, `"0.075"`) so amounts
    /// can be written by hand in config files.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let parsed = if raw.contains('~') {
            DecimalAmount::from_key(&raw)
        } else {
            raw.parse()
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

/// `10^n` as a `BigInt`.
pub(crate) fn pow10(n: u32) -> BigInt {
    BigInt::from(10).pow(n)
}

fn split_sign(s: &str) -> (&str, &str) {
    match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    }
}

fn split_leading_zeros(s: &str) -> (&str, &str) {
    let split = s.len() - s.trim_start_matches('0').len();
    s.split_at(split)
}

const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

fn subscript_number(n: usize) -> String {
    n.to_string()
        .bytes()
        .map(|b| SUBSCRIPT_DIGITS[(b - b'0') as usize])
        .collect()
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 3 == offset % 3 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Round a digit string to `keep` digits, half-up on the digit after.
fn round_digits(digits: &str, keep: usize) -> String {
    let take = &digits[..(keep + 1).min(digits.len())];
    match take.parse::<u128>() {
        Ok(n) => ((n + 5) / 10).to_string(),
        // Too many digits for u128; truncating is the best we can do.
        Err(_) => digits[..keep].to_string(),
    }
}
