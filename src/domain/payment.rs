use super::money::from_minor_units;
use super::session::{CheckoutSession, SessionPaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An append-only ledger entry for a settled checkout session.
///
/// `transaction_id` is unique across the ledger; stores enforce it with a unique index.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Major currency units, `amountTotal / 100`.
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Application id, stored under the historical `loanId` field name.
    #[serde(rename = "loanId")]
    pub application_id: Option<String>,
    #[serde(default)]
    pub loan_title: String,
    pub transaction_id: String,
    pub payment_status: SessionPaymentStatus,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn from_settled_session(
        session: &CheckoutSession,
        transaction_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            amount: from_minor_units(session.amount_total),
            currency: session.currency.clone(),
            customer_email: session.customer_email.clone(),
            application_id: session.application_id().map(str::to_string),
            loan_title: session.loan_title().to_string(),
            transaction_id: transaction_id.to_string(),
            payment_status: session.payment_status,
            paid_at,
        }
    }
}
