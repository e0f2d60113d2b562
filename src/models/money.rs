use serde::{Serialize, Serializer};
use std::fmt;

/// Amount of money in cents.
///
/// Rendered as a decimal string with two fraction digits (`"19.00"`), which
/// is also how it is serialized in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Price of `quantity` units, `None` on overflow.
    pub fn times(self, quantity: usize) -> Option<Money> {
        let quantity = i64::try_from(quantity).ok()?;
        self.0.checked_mul(quantity).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Money;
    use proptest::prelude::*;

    #[test]
    fn formats_with_two_fraction_digits() {
        assert_eq!(Money::from_cents(1900).to_string(), "19.00");
        assert_eq!(Money::from_cents(950).to_string(), "9.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-125).to_string(), "-1.25");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(1900)).unwrap();
        assert_eq!(json, "\"19.00\"");
    }

    #[test]
    fn two_seats_at_nine_fifty_cost_nineteen() {
        assert_eq!(Money::from_cents(950).times(2), Some(Money::from_cents(1900)));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(Money::from_cents(i64::MAX).times(2), None);
    }

    proptest! {
        #[test]
        fn total_is_unit_price_times_quantity(unit in 0i64..100_000, quantity in 1usize..500) {
            let total = Money::from_cents(unit).times(quantity).unwrap();
            prop_assert_eq!(total.cents(), unit * quantity as i64);
            prop_assert_eq!(total.cents() / quantity as i64, unit);
        }
    }
}
