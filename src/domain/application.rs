use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    /// Only pending applications move, and only to a final state.
    pub fn can_become(&self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (
                ApplicationStatus::Pending,
                ApplicationStatus::Approved
                    | ApplicationStatus::Rejected
                    | ApplicationStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the applicant's fee has been settled.
///
/// `Unset` keeps the `"unpaid"` wire value the front end already renders.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationPaymentStatus {
    #[default]
    #[serde(rename = "unpaid")]
    Unset,
    Paid,
}

/// A loan application.
///
/// `transaction_id` is written at most once, by payment reconciliation, and is never
/// replaced by a different value afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_email: String,
    /// Weak reference to the loan being applied for.
    pub loan_id: String,
    #[serde(default)]
    pub loan_title: String,
    pub amount: Amount,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub payment_status: ApplicationPaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for submitting an application.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub loan_id: String,
    pub amount: Amount,
}

impl Application {
    pub fn submit(user_email: &str, loan_id: &str, loan_title: &str, amount: Amount) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_email: user_email.to_string(),
            loan_id: loan_id.to_string(),
            loan_title: loan_title.to_string(),
            amount,
            status: ApplicationStatus::Pending,
            payment_status: ApplicationPaymentStatus::Unset,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
