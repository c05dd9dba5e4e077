//! Amount type for user-submitted entry values.
//!
//! Wraps `Decimal` so that `50` stays an integer and `50.5` stays fractional,
//! and renders without trailing zeros either way.

use crate::StepError;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A validated entry amount. May be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Amount(Decimal);

impl FromStr for Amount {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Decimal::from_str(trimmed)
            .map(|d| Amount(d.normalize()))
            .map_err(|_| {
                StepError::Validation(format!("'{trimmed}' is not a valid amount"))
            })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_amount_stays_integer() {
        let a = Amount::from_str("50").unwrap();
        assert_eq!(a.to_string(), "50");
    }

    #[test]
    fn fractional_amount_keeps_fraction() {
        let a = Amount::from_str("50.5").unwrap();
        assert_eq!(a.to_string(), "50.5");
    }

    #[test]
    fn trailing_zeros_are_dropped() {
        let a = Amount::from_str("50.00").unwrap();
        assert_eq!(a.to_string(), "50");
    }

    #[test]
    fn whitespace_is_trimmed() {
        let a = Amount::from_str("  12.75 ").unwrap();
        assert_eq!(a.to_string(), "12.75");
    }

    #[test]
    fn garbage_fails_validation() {
        let err = Amount::from_str("abc").unwrap_err();
        assert!(matches!(err, StepError::Validation(_)));
    }

    #[test]
    fn empty_fails_validation() {
        assert!(Amount::from_str("").is_err());
    }
}
