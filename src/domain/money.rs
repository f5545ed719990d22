use crate::error::LoanLinkError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A positive monetary amount in major currency units (e.g. dollars).
///
/// Wraps `rust_decimal::Decimal` so that checkout amounts are always positive and the
/// conversion to the gateway's minor units follows one rounding policy.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LoanLinkError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LoanLinkError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts to minor units by multiplying by 100 and truncating toward zero.
    ///
    /// `19.999` becomes `1999`, never `2000`.
    pub fn to_minor_units(&self) -> Result<i64, LoanLinkError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.trunc().to_i64())
            .ok_or_else(|| LoanLinkError::ValidationError("Amount is too large".to_string()))
    }
}

/// Exact major-unit value of a gateway amount expressed in minor units.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

impl TryFrom<Decimal> for Amount {
    type Error = LoanLinkError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LoanLinkError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LoanLinkError::ValidationError(_))
        ));
    }

    #[test]
    fn test_minor_units_truncate() {
        assert_eq!(Amount::new(dec!(19.999)).unwrap().to_minor_units().unwrap(), 1999);
        assert_eq!(Amount::new(dec!(25)).unwrap().to_minor_units().unwrap(), 2500);
        assert_eq!(Amount::new(dec!(0.019)).unwrap().to_minor_units().unwrap(), 1);
        assert_eq!(Amount::new(dec!(10.005)).unwrap().to_minor_units().unwrap(), 1000);
    }

    #[test]
    fn test_minor_units_overflow_is_rejected() {
        let huge = Amount::new(Decimal::MAX).unwrap();
        assert!(huge.to_minor_units().is_err());
    }

    #[test]
    fn test_from_minor_units_is_exact() {
        assert_eq!(from_minor_units(5000), dec!(50));
        assert_eq!(from_minor_units(2500), dec!(25));
        assert_eq!(from_minor_units(1999), dec!(19.99));
    }

    #[test]
    fn test_amount_deserializes_from_json_number() {
        let amount: Amount = serde_json::from_str("19.999").unwrap();
        assert_eq!(amount.value(), dec!(19.999));
        assert!(serde_json::from_str::<Amount>("0").is_err());
    }
}
