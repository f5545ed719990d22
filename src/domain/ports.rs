use super::application::{Application, ApplicationStatus};
use super::loan::Loan;
use super::payment::PaymentRecord;
use super::session::{CheckoutRequest, CheckoutSession, CreatedSession};
use super::user::{Principal, Role, User};
use crate::error::{AuthError, GatewayError, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of linking a settled payment to its application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentLink {
    /// The application was unpaid and now carries the transaction id.
    Updated,
    /// The application already carries this same transaction id.
    AlreadyLinked,
    /// The application is linked to a different transaction and was left untouched.
    Conflict { existing: String },
    /// No application has this id.
    NotFound,
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn insert(&self, loan: Loan) -> StoreResult<()>;
    async fn get(&self, id: &str) -> StoreResult<Option<Loan>>;
    /// All loans, newest first.
    async fn list(&self) -> StoreResult<Vec<Loan>>;
    /// Up to `limit` loans for the home page, preferring `show_on_home`, newest first.
    async fn list_home(&self, limit: usize) -> StoreResult<Vec<Loan>>;
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(&self, application: Application) -> StoreResult<()>;
    async fn get(&self, id: &str) -> StoreResult<Option<Application>>;
    async fn list_by_user(&self, email: &str) -> StoreResult<Vec<Application>>;
    async fn list_all(&self, status: Option<ApplicationStatus>) -> StoreResult<Vec<Application>>;
    /// Moves `id` from `from` to `to` in one targeted update.
    ///
    /// Returns `None` when no application with that id is currently in `from`.
    async fn update_status(
        &self,
        id: &str,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> StoreResult<Option<Application>>;
    /// Sets `paymentStatus = paid` and `transactionId` unless a transaction is already set.
    async fn mark_paid(&self, id: &str, transaction_id: &str) -> StoreResult<PaymentLink>;
}

/// The append-only payment ledger.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_transaction(&self, transaction_id: &str)
    -> StoreResult<Option<PaymentRecord>>;
    /// Fails with [`StoreError::Duplicate`] when the transaction id is already recorded.
    async fn insert(&self, record: PaymentRecord) -> StoreResult<()>;
    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts the user if the email is unknown; an existing user is returned unchanged.
    async fn upsert(&self, user: User) -> StoreResult<User>;
    async fn get(&self, email: &str) -> StoreResult<Option<User>>;
    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CreatedSession, GatewayError>;
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, bearer: &str) -> Result<Principal, AuthError>;
}

pub type LoanStoreRef = Arc<dyn LoanStore>;
pub type ApplicationStoreRef = Arc<dyn ApplicationStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type UserStoreRef = Arc<dyn UserStore>;
pub type CheckoutGatewayRef = Arc<dyn CheckoutGateway>;
pub type IdentityVerifierRef = Arc<dyn IdentityVerifier>;

/// One handle per record set, acquired once per process and shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub loans: LoanStoreRef,
    pub applications: ApplicationStoreRef,
    pub payments: PaymentStoreRef,
    pub users: UserStoreRef,
}
