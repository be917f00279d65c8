use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "USD";
pub const USD_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------     UsdCents       ---------------------------------------------------------
/// A monetary amount in US cents. All prices in the system are integer cents to keep
/// arithmetic exact; formatting to dollars happens at display time only.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UsdCents(i64);

op!(binary UsdCents, Add, add);
op!(binary UsdCents, Sub, sub);
op!(inplace UsdCents, SubAssign, sub_assign);
op!(unary UsdCents, Neg, neg);

impl Mul<i64> for UsdCents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for UsdCents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in US cents: {0}")]
pub struct UsdCentsConversionError(String);

impl From<i64> for UsdCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for UsdCents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for UsdCents {}

impl TryFrom<u64> for UsdCents {
    type Error = UsdCentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(UsdCentsConversionError(format!("Value {} is too large to convert to UsdCents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for UsdCents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dollars = self.0 as f64 / 100.0;
        write!(f, "${dollars:0.2}")
    }
}

impl UsdCents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_and_display() {
        let a = UsdCents::from(15_600);
        let b = UsdCents::from_dollars(80);
        assert_eq!(a - b, UsdCents::from(7_600));
        assert_eq!(a + b, UsdCents::from(23_600));
        assert_eq!(-b, UsdCents::from(-8_000));
        assert_eq!(a.to_string(), "$156.00");
        assert_eq!(UsdCents::from(5).to_string(), "$0.05");
    }

    #[test]
    fn sum_of_prices() {
        let total: UsdCents = [100, 250, 399].into_iter().map(UsdCents::from).sum();
        assert_eq!(total, UsdCents::from(749));
    }
}
