use crate::domain::application::{Application, ApplicationPaymentStatus, ApplicationStatus};
use crate::domain::loan::Loan;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{
    ApplicationStore, CheckoutGateway, LoanStore, PaymentLink, PaymentStore, StoreResult, Stores,
    UserStore,
};
use crate::domain::session::{
    CheckoutRequest, CheckoutSession, CreatedSession, SessionPaymentStatus,
};
use crate::domain::user::{Role, User};
use crate::error::{GatewayError, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Builds a full set of empty in-memory stores.
pub fn in_memory_stores() -> Stores {
    Stores {
        loans: Arc::new(InMemoryLoanStore::new()),
        applications: Arc::new(InMemoryApplicationStore::new()),
        payments: Arc::new(InMemoryPaymentStore::new()),
        users: Arc::new(InMemoryUserStore::new()),
    }
}

/// A thread-safe in-memory store for loan listings.
#[derive(Default, Clone)]
pub struct InMemoryLoanStore {
    loans: Arc<RwLock<HashMap<String, Loan>>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn insert(&self, loan: Loan) -> StoreResult<()> {
        let mut loans = self.loans.write().await;
        if loans.contains_key(&loan.id) {
            return Err(StoreError::Duplicate {
                collection: "loans",
                field: "_id",
                value: loan.id,
            });
        }
        loans.insert(loan.id.clone(), loan);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Loan>> {
        let loans = self.loans.read().await;
        Ok(loans.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Loan>> {
        let loans = self.loans.read().await;
        let mut all: Vec<Loan> = loans.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn list_home(&self, limit: usize) -> StoreResult<Vec<Loan>> {
        let mut all = self.list().await?;
        // Stable sort keeps newest-first order within each group.
        all.sort_by_key(|loan| !loan.show_on_home);
        all.truncate(limit);
        Ok(all)
    }
}

/// A thread-safe in-memory store for loan applications.
///
/// Every mutation happens under the write lock, so conditional updates behave like the
/// targeted filters a document store applies.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    applications: Arc<RwLock<HashMap<String, Application>>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn insert(&self, application: Application) -> StoreResult<()> {
        let mut applications = self.applications.write().await;
        if applications.contains_key(&application.id) {
            return Err(StoreError::Duplicate {
                collection: "applications",
                field: "_id",
                value: application.id,
            });
        }
        applications.insert(application.id.clone(), application);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Application>> {
        let applications = self.applications.read().await;
        Ok(applications.get(id).cloned())
    }

    async fn list_by_user(&self, email: &str) -> StoreResult<Vec<Application>> {
        let applications = self.applications.read().await;
        let mut mine: Vec<Application> = applications
            .values()
            .filter(|app| app.user_email == email)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn list_all(&self, status: Option<ApplicationStatus>) -> StoreResult<Vec<Application>> {
        let applications = self.applications.read().await;
        let mut all: Vec<Application> = applications
            .values()
            .filter(|app| status.is_none_or(|wanted| app.status == wanted))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn update_status(
        &self,
        id: &str,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> StoreResult<Option<Application>> {
        let mut applications = self.applications.write().await;
        match applications.get_mut(id) {
            Some(app) if app.status == from => {
                app.status = to;
                app.updated_at = Utc::now();
                Ok(Some(app.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_paid(&self, id: &str, transaction_id: &str) -> StoreResult<PaymentLink> {
        let mut applications = self.applications.write().await;
        let Some(app) = applications.get_mut(id) else {
            return Ok(PaymentLink::NotFound);
        };

        match app.transaction_id.as_deref() {
            None => {
                app.payment_status = ApplicationPaymentStatus::Paid;
                app.transaction_id = Some(transaction_id.to_string());
                app.updated_at = Utc::now();
                Ok(PaymentLink::Updated)
            }
            Some(existing) if existing == transaction_id => Ok(PaymentLink::AlreadyLinked),
            Some(existing) => Ok(PaymentLink::Conflict {
                existing: existing.to_string(),
            }),
        }
    }
}

/// A thread-safe in-memory payment ledger keyed by transaction id.
///
/// The map key doubles as the unique index on `transactionId`.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<String, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<PaymentRecord>> {
        let records = self.records.read().await;
        Ok(records.get(transaction_id).cloned())
    }

    async fn insert(&self, record: PaymentRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.transaction_id) {
            return Err(StoreError::Duplicate {
                collection: "payment_info",
                field: "transactionId",
                value: record.transaction_id,
            });
        }
        records.insert(record.transaction_id.clone(), record);
        Ok(())
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<PaymentRecord>> {
        let records = self.records.read().await;
        let mut mine: Vec<PaymentRecord> = records
            .values()
            .filter(|record| record.customer_email.as_deref() == Some(email))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(mine)
    }
}

/// A thread-safe in-memory user directory keyed by email.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        Ok(users.entry(user.email.clone()).or_insert(user).clone())
    }

    async fn get(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(email).cloned())
    }

    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(email).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }
}

/// A scripted checkout gateway for local runs and tests.
///
/// Sessions start `unpaid`; [`InMemoryCheckoutGateway::settle`] marks one paid the way the
/// provider would after the customer completes the hosted page.
#[derive(Default, Clone)]
pub struct InMemoryCheckoutGateway {
    sessions: Arc<RwLock<HashMap<String, CheckoutSession>>>,
    requests: Arc<RwLock<Vec<CheckoutRequest>>>,
    outage: Arc<RwLock<Option<GatewayError>>>,
    next_id: Arc<AtomicUsize>,
    retrievals: Arc<AtomicUsize>,
}

impl InMemoryCheckoutGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session directly, bypassing `create_session`.
    pub async fn insert_session(&self, session: CheckoutSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session);
    }

    /// Marks a session paid and assigns its payment intent.
    pub async fn settle(&self, session_id: &str, payment_intent_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.payment_status = SessionPaymentStatus::Paid;
                session.payment_intent_id = Some(payment_intent_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Makes every subsequent call fail with `error` until cleared with `None`.
    pub async fn set_outage(&self, error: Option<GatewayError>) {
        *self.outage.write().await = error;
    }

    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.read().await.clone()
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    async fn check_outage(&self) -> Result<(), GatewayError> {
        match self.outage.read().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CheckoutGateway for InMemoryCheckoutGateway {
    async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CreatedSession, GatewayError> {
        self.check_outage().await?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_test_{n}");
        let session = CheckoutSession {
            session_id: session_id.clone(),
            payment_status: SessionPaymentStatus::Unpaid,
            payment_intent_id: None,
            amount_total: request.line_item.unit_amount_minor_units,
            currency: request.line_item.currency.clone(),
            customer_email: Some(request.customer_email.clone()),
            metadata: request.metadata.clone(),
        };

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), session);
        self.requests.write().await.push(request.clone());

        Ok(CreatedSession {
            url: format!("https://checkout.test/pay/{session_id}"),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        self.check_outage().await?;

        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }
}
