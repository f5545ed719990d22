use crate::domain::money::Amount;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{ApplicationStoreRef, CheckoutGatewayRef, PaymentLink, PaymentStoreRef};
use crate::domain::session::{
    CheckoutRequest, CheckoutSession, LineItem, METADATA_APPLICATION_ID, METADATA_LOAN_TITLE,
    SessionPaymentStatus,
};
use crate::error::{GatewayError, ReconcileError, StoreError};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Checkout parameters that do not vary per request.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    /// Redirect after payment; `{CHECKOUT_SESSION_ID}` is substituted by the provider.
    pub success_url: String,
    pub cancel_url: String,
    pub gateway_timeout: Duration,
}

/// Input to [`PaymentReconciler::initiate_checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutInitiation {
    /// The application being paid for; sent to the gateway under the `loanId` key.
    pub application_id: String,
    pub loan_title: String,
    /// Major currency units.
    pub amount: Decimal,
    pub customer_email: String,
}

/// What a reconciliation call did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// The transaction was already in the ledger; nothing was written.
    AlreadyRecorded { record: PaymentRecord },
    /// The session exists but has not been paid; nothing was written.
    NotPaid {
        session_id: String,
        payment_status: SessionPaymentStatus,
    },
    /// The ledger entry was written by this call.
    Recorded {
        application: PaymentLink,
        payment: PaymentRecord,
    },
}

/// Turns a settled checkout session into durable local state exactly once.
///
/// The ledger's unique `transactionId` is the single source of truth for "already
/// recorded". It is consulted on entry and again right before the insert, and a uniqueness
/// violation on the insert itself is treated exactly like the entry check finding a record.
/// The application update is idempotent for the same transaction id, so a call that failed
/// between the two writes can simply be repeated.
pub struct PaymentReconciler {
    gateway: CheckoutGatewayRef,
    applications: ApplicationStoreRef,
    payments: PaymentStoreRef,
    settings: CheckoutSettings,
}

impl PaymentReconciler {
    pub fn new(
        gateway: CheckoutGatewayRef,
        applications: ApplicationStoreRef,
        payments: PaymentStoreRef,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            gateway,
            applications,
            payments,
            settings,
        }
    }

    /// Opens a hosted checkout page and returns its URL.
    ///
    /// Nothing is persisted here; local state is only written once settlement is confirmed.
    pub async fn initiate_checkout(
        &self,
        checkout: CheckoutInitiation,
    ) -> Result<String, ReconcileError> {
        if checkout.application_id.trim().is_empty() {
            return Err(ReconcileError::InvalidRequest(
                "loanId must name the application being paid for".to_string(),
            ));
        }
        let amount = Amount::new(checkout.amount)
            .map_err(|e| ReconcileError::InvalidRequest(e.to_string()))?;
        let unit_amount = amount
            .to_minor_units()
            .map_err(|e| ReconcileError::InvalidRequest(e.to_string()))?;
        if unit_amount == 0 {
            return Err(ReconcileError::InvalidRequest(
                "Amount is smaller than one minor currency unit".to_string(),
            ));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(
            METADATA_APPLICATION_ID.to_string(),
            checkout.application_id.clone(),
        );
        metadata.insert(METADATA_LOAN_TITLE.to_string(), checkout.loan_title.clone());

        let request = CheckoutRequest {
            line_item: LineItem {
                currency: self.settings.currency.clone(),
                unit_amount_minor_units: unit_amount,
                product_name: checkout.loan_title,
            },
            customer_email: checkout.customer_email,
            metadata,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
        };

        let created = self
            .bounded(self.gateway.create_session(&request))
            .await?;
        info!(
            session_id = %created.session_id,
            application_id = %checkout.application_id,
            unit_amount,
            "checkout session created"
        );
        Ok(created.url)
    }

    /// Applies the settlement state of `session_id` to the application and the ledger.
    pub async fn reconcile(&self, session_id: &str) -> Result<ReconciliationOutcome, ReconcileError> {
        let session = self.bounded(self.gateway.retrieve_session(session_id)).await?;

        if let Some(transaction_id) = session.payment_intent_id.as_deref()
            && let Some(record) = self.payments.find_by_transaction(transaction_id).await?
        {
            info!(session_id, transaction_id, outcome = "already_recorded", "payment reconciled");
            return Ok(ReconciliationOutcome::AlreadyRecorded { record });
        }

        if !session.is_paid() {
            info!(session_id, status = ?session.payment_status, outcome = "not_paid", "payment reconciled");
            return Ok(ReconciliationOutcome::NotPaid {
                session_id: session.session_id,
                payment_status: session.payment_status,
            });
        }

        let Some(transaction_id) = session.payment_intent_id.clone() else {
            return Err(ReconcileError::MalformedSession(session.session_id));
        };

        let application = self.link_application(&session, &transaction_id).await?;
        self.record_payment(&session, &transaction_id, application)
            .await
    }

    /// Read-only ledger lookup for receipts.
    pub async fn lookup_payment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, ReconcileError> {
        Ok(self.payments.find_by_transaction(transaction_id).await?)
    }

    /// Ledger entries paid under `email`, for the payer's history page.
    pub async fn payments_of(&self, email: &str) -> Result<Vec<PaymentRecord>, ReconcileError> {
        Ok(self.payments.list_by_email(email).await?)
    }

    async fn link_application(
        &self,
        session: &CheckoutSession,
        transaction_id: &str,
    ) -> Result<PaymentLink, ReconcileError> {
        let Some(application_id) = session.application_id() else {
            warn!(
                session_id = %session.session_id,
                transaction_id,
                "ApplicationNotFound: session carries no application id; recording payment anyway"
            );
            return Ok(PaymentLink::NotFound);
        };

        let link = self
            .applications
            .mark_paid(application_id, transaction_id)
            .await?;
        match &link {
            PaymentLink::NotFound => warn!(
                application_id,
                transaction_id, "ApplicationNotFound: recording payment anyway"
            ),
            PaymentLink::Conflict { existing } => warn!(
                application_id,
                transaction_id,
                existing = %existing,
                "application already linked to another transaction; left unchanged"
            ),
            PaymentLink::Updated | PaymentLink::AlreadyLinked => {}
        }
        Ok(link)
    }

    async fn record_payment(
        &self,
        session: &CheckoutSession,
        transaction_id: &str,
        application: PaymentLink,
    ) -> Result<ReconciliationOutcome, ReconcileError> {
        // The entry check may be stale by now.
        if let Some(record) = self.payments.find_by_transaction(transaction_id).await? {
            info!(transaction_id, outcome = "already_recorded", "payment reconciled");
            return Ok(ReconciliationOutcome::AlreadyRecorded { record });
        }

        let record = PaymentRecord::from_settled_session(session, transaction_id, Utc::now());
        match self.payments.insert(record.clone()).await {
            Ok(()) => {
                info!(
                    session_id = %session.session_id,
                    transaction_id,
                    amount = %record.amount,
                    outcome = "recorded",
                    "payment reconciled"
                );
                Ok(ReconciliationOutcome::Recorded {
                    application,
                    payment: record,
                })
            }
            Err(StoreError::Duplicate { .. }) => {
                warn!(transaction_id, "DuplicateLedgerEntry: concurrent reconciliation won");
                match self.payments.find_by_transaction(transaction_id).await? {
                    Some(existing) => {
                        Ok(ReconciliationOutcome::AlreadyRecorded { record: existing })
                    }
                    None => {
                        error!(
                            transaction_id,
                            "ledger rejected the entry as a duplicate but holds no readable record"
                        );
                        Err(ReconcileError::StoreUnavailable(StoreError::Backend(format!(
                            "ledger entry for {transaction_id} is unreadable after a duplicate insert"
                        ))))
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Runs a gateway call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, ReconcileError> {
        match tokio::time::timeout(self.settings.gateway_timeout, call).await {
            Ok(result) => result.map_err(ReconcileError::from),
            Err(_) => Err(ReconcileError::GatewayUnavailable(format!(
                "checkout gateway did not answer within {:?}",
                self.settings.gateway_timeout
            ))),
        }
    }
}
