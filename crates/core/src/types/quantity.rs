//! Positive line quantities.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities must be at least one.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// The quantity does not fit the storage column.
    #[error("quantity is too large: {0}")]
    TooLarge(i64),
}

/// A line quantity, always `>= 1`.
///
/// Stored as `INTEGER` so the upper bound is `i32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// Create a quantity, rejecting zero and negatives.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` if `value < 1`.
    pub const fn new(value: i32) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::NotPositive(value as i64));
        }
        Ok(Self(value))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }

    /// Add two quantities, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let narrowed = i32::try_from(value).map_err(|_| {
            if value < 1 {
                QuantityError::NotPositive(value)
            } else {
                QuantityError::TooLarge(value)
            }
        })?;
        Self::new(narrowed)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero_and_negative() {
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
        assert_eq!(Quantity::new(-4), Err(QuantityError::NotPositive(-4)));
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
    }

    #[test]
    fn test_quantity_checked_add() {
        let a = Quantity::new(2).unwrap();
        let b = Quantity::new(3).unwrap();
        assert_eq!(a.checked_add(b), Quantity::new(5).ok());
        assert_eq!(Quantity::new(i32::MAX).unwrap().checked_add(a), None);
    }

    #[test]
    fn test_quantity_deserialize_validates() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("99999999999").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("7").unwrap().get(), 7);
    }
}
