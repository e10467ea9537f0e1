// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fixed-point money type.
//!
//! All balance math in the ledger goes through [`Money`]; no floating-point
//! amounts anywhere. Values are kept at exactly two decimal places (centavos).
//! Construction from a decimal string uses banker's rounding (round half to
//! even), the default rounding of [`rust_decimal::Decimal`].

use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A signed monetary amount with a fixed scale of two decimal places.
///
/// # Example
///
/// ```
/// use payout_ledger_rs::Money;
///
/// let price = Money::parse("150.00").unwrap();
/// let fee = Money::from_centavos(1_500);
/// assert_eq!((price - fee).to_string(), "135.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places every amount is normalized to.
    pub const SCALE: u32 = 2;

    /// The zero amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates an amount from an integer count of minor units (centavos).
    pub fn from_centavos(centavos: i64) -> Self {
        Money(Decimal::new(centavos, Self::SCALE))
    }

    /// Creates an amount from a decimal, rounding to the minor unit with
    /// banker's rounding.
    pub fn from_decimal(value: Decimal) -> Self {
        Money(value.round_dp(Self::SCALE))
    }

    /// Parses a decimal string (e.g. `"150.00"`), rounding to the minor unit
    /// with banker's rounding.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the string is not a valid
    /// decimal number.
    pub fn parse(input: &str) -> Result<Self, LedgerError> {
        input
            .trim()
            .parse::<Decimal>()
            .map(Self::from_decimal)
            .map_err(|_| LedgerError::InvalidAmount)
    }

    /// Underlying decimal value.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rescaled())
    }
}

impl Money {
    /// Value with the scale forced to exactly [`Self::SCALE`] digits, so
    /// zero renders as `0.00` rather than `0`.
    fn rescaled(&self) -> Decimal {
        let mut value = self.0.round_dp(Self::SCALE);
        value.rescale(Self::SCALE);
        value
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.rescaled())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::from_decimal)
    }
}
