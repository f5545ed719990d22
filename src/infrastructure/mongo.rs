//! MongoDB document store.
//!
//! One [`MongoStore`] is connected per process and cloned into every request. All writes
//! are targeted `updateOne`/`insertOne` calls keyed by a unique field; the ledger relies on
//! a unique index on `transactionId` rather than on read-then-write checks.

use crate::domain::application::{Application, ApplicationStatus};
use crate::domain::loan::Loan;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{
    ApplicationStore, LoanStore, PaymentLink, PaymentStore, StoreResult, Stores, UserStore,
};
use crate::domain::user::{Role, User};
use crate::error::StoreError;
use async_trait::async_trait;
use bson::{Document, doc};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

pub const LOANS: &str = "loans";
pub const APPLICATIONS: &str = "applications";
pub const USERS: &str = "users";
pub const PAYMENTS: &str = "payment_info";

const DUPLICATE_KEY: i32 = 11000;

/// Index definitions, declared per record set.
pub trait IntoIndexes {
    fn into_indexes() -> Vec<(Document, Option<IndexOptions>)>;
}

impl IntoIndexes for Loan {
    fn into_indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(doc! { "showOnHome": -1, "createdAt": -1 }, None)]
    }
}

impl IntoIndexes for Application {
    fn into_indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "userEmail": 1 }, None),
            (doc! { "status": 1 }, None),
        ]
    }
}

impl IntoIndexes for User {
    fn into_indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl IntoIndexes for PaymentRecord {
    fn into_indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "transactionId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("transaction_id_unique".to_string())
                        .build(),
                ),
            ),
            (doc! { "customerEmail": 1 }, None),
        ]
    }
}

fn backend(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

/// Same rendering serde gives `DateTime<Utc>`, so stored timestamps sort consistently.
fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connects, pings, and applies every record set's indexes.
    pub async fn connect(uri: &str, db_name: &str) -> StoreResult<Self> {
        info!(db = db_name, "connecting to MongoDB");
        let client = Client::with_uri_str(uri).await.map_err(backend)?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 }).await.map_err(backend)?;

        let store = Self { db };
        store.apply_indexes::<Loan>(LOANS).await?;
        store.apply_indexes::<Application>(APPLICATIONS).await?;
        store.apply_indexes::<User>(USERS).await?;
        store.apply_indexes::<PaymentRecord>(PAYMENTS).await?;

        info!(db = db_name, "connected to MongoDB");
        Ok(store)
    }

    /// The four record sets, each backed by this connection.
    pub fn stores(&self) -> Stores {
        let shared = Arc::new(self.clone());
        Stores {
            loans: shared.clone(),
            applications: shared.clone(),
            payments: shared.clone(),
            users: shared,
        }
    }

    fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        self.db.collection::<T>(name)
    }

    async fn apply_indexes<T>(&self, name: &str) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync + IntoIndexes,
    {
        let indexes: Vec<IndexModel> = T::into_indexes()
            .into_iter()
            .map(|(keys, options)| IndexModel::builder().keys(keys).options(options).build())
            .collect();
        if indexes.is_empty() {
            return Ok(());
        }

        self.collection::<T>(name)
            .create_indexes(indexes)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MongoStore {
    async fn insert(&self, loan: Loan) -> StoreResult<()> {
        self.collection::<Loan>(LOANS)
            .insert_one(loan)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Loan>> {
        self.collection::<Loan>(LOANS)
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend)
    }

    async fn list(&self) -> StoreResult<Vec<Loan>> {
        self.collection::<Loan>(LOANS)
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }

    async fn list_home(&self, limit: usize) -> StoreResult<Vec<Loan>> {
        self.collection::<Loan>(LOANS)
            .find(doc! {})
            .sort(doc! { "showOnHome": -1, "createdAt": -1 })
            .limit(limit as i64)
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl ApplicationStore for MongoStore {
    async fn insert(&self, application: Application) -> StoreResult<()> {
        self.collection::<Application>(APPLICATIONS)
            .insert_one(application)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Application>> {
        self.collection::<Application>(APPLICATIONS)
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend)
    }

    async fn list_by_user(&self, email: &str) -> StoreResult<Vec<Application>> {
        self.collection::<Application>(APPLICATIONS)
            .find(doc! { "userEmail": email })
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }

    async fn list_all(&self, status: Option<ApplicationStatus>) -> StoreResult<Vec<Application>> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };
        self.collection::<Application>(APPLICATIONS)
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }

    async fn update_status(
        &self,
        id: &str,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> StoreResult<Option<Application>> {
        self.collection::<Application>(APPLICATIONS)
            .find_one_and_update(
                doc! { "_id": id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updatedAt": now() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend)
    }

    async fn mark_paid(&self, id: &str, transaction_id: &str) -> StoreResult<PaymentLink> {
        let applications = self.collection::<Application>(APPLICATIONS);

        // `transactionId: null` matches both a missing and an explicit null field.
        let result = applications
            .update_one(
                doc! { "_id": id, "transactionId": null },
                doc! { "$set": {
                    "paymentStatus": "paid",
                    "transactionId": transaction_id,
                    "updatedAt": now(),
                } },
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 1 {
            return Ok(PaymentLink::Updated);
        }

        let existing = applications
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend)?;
        Ok(match existing.and_then(|app| app.transaction_id) {
            None => PaymentLink::NotFound,
            Some(existing) if existing == transaction_id => PaymentLink::AlreadyLinked,
            Some(existing) => PaymentLink::Conflict { existing },
        })
    }
}

#[async_trait]
impl PaymentStore for MongoStore {
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<PaymentRecord>> {
        self.collection::<PaymentRecord>(PAYMENTS)
            .find_one(doc! { "transactionId": transaction_id })
            .await
            .map_err(backend)
    }

    async fn insert(&self, record: PaymentRecord) -> StoreResult<()> {
        let transaction_id = record.transaction_id.clone();
        match self
            .collection::<PaymentRecord>(PAYMENTS)
            .insert_one(record)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::Duplicate {
                collection: PAYMENTS,
                field: "transactionId",
                value: transaction_id,
            }),
            Err(err) => Err(backend(err)),
        }
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<PaymentRecord>> {
        self.collection::<PaymentRecord>(PAYMENTS)
            .find(doc! { "customerEmail": email })
            .sort(doc! { "paidAt": -1 })
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn upsert(&self, user: User) -> StoreResult<User> {
        let users = self.collection::<User>(USERS);
        let document =
            bson::to_document(&user).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;

        users
            .update_one(
                doc! { "email": user.email.as_str() },
                doc! { "$setOnInsert": document },
            )
            .upsert(true)
            .await
            .map_err(backend)?;

        users
            .find_one(doc! { "email": user.email.as_str() })
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::Backend(format!("user {} vanished after upsert", user.email)))
    }

    async fn get(&self, email: &str) -> StoreResult<Option<User>> {
        self.collection::<User>(USERS)
            .find_one(doc! { "email": email })
            .await
            .map_err(backend)
    }

    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<User>> {
        self.collection::<User>(USERS)
            .find_one_and_update(
                doc! { "email": email },
                doc! { "$set": { "role": role.as_str() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        self.collection::<User>(USERS)
            .find(doc! {})
            .sort(doc! { "email": 1 })
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)
    }
}
