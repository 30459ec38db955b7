//! Arithmetic over [`DecimalAmount`].
//!
//! Addition and subtraction rescale both operands to the larger scale and
//! operate on the unscaled integers; multiplication adds scales; division
//! produces a result at an exact caller-chosen scale. Division by zero is a
//! hard error, never a silent coercion.

use super::amount::{pow10, DecimalAmount};
use num_traits::Zero;
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

/// Arithmetic failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("division by zero")]
    DivisionByZero,
}

fn add_impl(a: &DecimalAmount, b: &DecimalAmount) -> DecimalAmount {
    let scale = a.scale().max(b.scale());
    DecimalAmount::new(a.rescaled_up(scale) + b.rescaled_up(scale), scale)
}

fn sub_impl(a: &DecimalAmount, b: &DecimalAmount) -> DecimalAmount {
    let scale = a.scale().max(b.scale());
    DecimalAmount::new(a.rescaled_up(scale) - b.rescaled_up(scale), scale)
}

fn mul_impl(a: &DecimalAmount, b: &DecimalAmount) -> DecimalAmount {
    DecimalAmount::new(a.unscaled() * b.unscaled(), a.scale() + b.scale())
}

impl DecimalAmount {
    /// Divide, producing a result with exactly `places` decimal places.
    ///
    /// Both operands are brought to a common scale, then the dividend is
    /// scaled up by `10^places` before truncating integer division, so the
    /// quotient carries `places` fractional digits. The sign follows
    /// `sign(self) * sign(rhs)`.
    pub fn checked_div(
        &self,
        rhs: &DecimalAmount,
        places: u32,
    ) -> Result<DecimalAmount, DecimalError> {
        if rhs.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let scale = self.scale().max(rhs.scale());
        let dividend = self.rescaled_up(scale) * pow10(places);
        let divisor = rhs.rescaled_up(scale);
        Ok(DecimalAmount::new(dividend / divisor, places))
    }

    /// The additive inverse. Negating zero yields the canonical zero at
    /// scale 0, never a negative zero.
    pub fn negate(&self) -> DecimalAmount {
        if self.is_zero() {
            return DecimalAmount::zero();
        }
        DecimalAmount::new(-self.unscaled().clone(), self.scale())
    }
}

impl Add for DecimalAmount {
    type Output = DecimalAmount;
    fn add(self, rhs: DecimalAmount) -> DecimalAmount {
        add_impl(&self, &rhs)
    }
}

impl Add for &DecimalAmount {
    type Output = DecimalAmount;
    fn add(self, rhs: &DecimalAmount) -> DecimalAmount {
        add_impl(self, rhs)
    }
}

impl Sub for DecimalAmount {
    type Output = DecimalAmount;
    fn sub(self, rhs: DecimalAmount) -> DecimalAmount {
        sub_impl(&self, &rhs)
    }
}

impl Sub for &DecimalAmount {
    type Output = DecimalAmount;
    fn sub(self, rhs: &DecimalAmount) -> DecimalAmount {
        sub_impl(self, rhs)
    }
}

impl Mul for DecimalAmount {
    type Output = DecimalAmount;
    fn mul(self, rhs: DecimalAmount) -> DecimalAmount {
        mul_impl(&self, &rhs)
    }
}

impl Mul for &DecimalAmount {
    type Output = DecimalAmount;
    fn mul(self, rhs: &DecimalAmount) -> DecimalAmount {
        mul_impl(self, rhs)
    }
}

impl Neg for DecimalAmount {
    type Output = DecimalAmount;
    fn neg(self) -> DecimalAmount {
        self.negate()
    }
}

impl Neg for &DecimalAmount {
    type Output = DecimalAmount;
    fn neg(self) -> DecimalAmount {
        self.negate()
    }
}

impl Zero for DecimalAmount {
    fn zero() -> Self {
        DecimalAmount::zero()
    }

    fn is_zero(&self) -> bool {
        DecimalAmount::is_zero(self)
    }
}
