use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key carrying the application id through checkout.
///
/// The key keeps its historical `loanId` name because the front end and already-created
/// sessions use it, but the value is always an **application** id, never a loan id.
pub const METADATA_APPLICATION_ID: &str = "loanId";
/// Metadata key carrying the loan title shown on the receipt.
pub const METADATA_LOAN_TITLE: &str = "loanTitle";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    Other,
}

impl SessionPaymentStatus {
    pub fn from_provider(status: &str) -> Self {
        match status {
            "paid" => SessionPaymentStatus::Paid,
            "unpaid" => SessionPaymentStatus::Unpaid,
            _ => SessionPaymentStatus::Other,
        }
    }
}

/// A checkout session as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub payment_status: SessionPaymentStatus,
    /// The durable transaction reference; absent until the provider creates the intent.
    pub payment_intent_id: Option<String>,
    /// Total in minor currency units.
    pub amount_total: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == SessionPaymentStatus::Paid
    }

    pub fn application_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_APPLICATION_ID)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn loan_title(&self) -> &str {
        self.metadata
            .get(METADATA_LOAN_TITLE)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub currency: String,
    pub unit_amount_minor_units: i64,
    pub product_name: String,
}

/// Everything the gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub line_item: LineItem,
    pub customer_email: String,
    pub metadata: BTreeMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session_id: String,
    pub url: String,
}
