use crate::error::LoanLinkError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A loan product listed on the marketplace.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub interest_rate: Decimal,
    pub max_limit: Decimal,
    /// Email of the manager who published the listing.
    pub created_by: String,
    #[serde(default)]
    pub show_on_home: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for publishing a loan.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewLoan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub interest_rate: Decimal,
    pub max_limit: Decimal,
    #[serde(default)]
    pub show_on_home: bool,
}

impl NewLoan {
    pub fn into_loan(self, created_by: &str) -> Result<Loan, LoanLinkError> {
        if self.title.trim().is_empty() {
            return Err(LoanLinkError::ValidationError(
                "Loan title must not be empty".to_string(),
            ));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(LoanLinkError::ValidationError(
                "Interest rate must not be negative".to_string(),
            ));
        }
        if self.max_limit <= Decimal::ZERO {
            return Err(LoanLinkError::ValidationError(
                "Maximum limit must be positive".to_string(),
            ));
        }

        Ok(Loan {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            interest_rate: self.interest_rate,
            max_limit: self.max_limit,
            created_by: created_by.to_string(),
            show_on_home: self.show_on_home,
            created_at: Utc::now(),
        })
    }
}
