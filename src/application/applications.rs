use crate::domain::application::{Application, ApplicationStatus, NewApplication};
use crate::domain::ports::{ApplicationStoreRef, LoanStoreRef};
use crate::domain::user::Principal;
use crate::error::ServiceError;
use tracing::info;

/// Submission and status transitions for loan applications.
///
/// Payment fields are never touched here; only the reconciler sets them.
#[derive(Clone)]
pub struct ApplicationService {
    applications: ApplicationStoreRef,
    loans: LoanStoreRef,
}

impl ApplicationService {
    pub fn new(applications: ApplicationStoreRef, loans: LoanStoreRef) -> Self {
        Self {
            applications,
            loans,
        }
    }

    pub async fn submit(
        &self,
        applicant: &Principal,
        request: NewApplication,
    ) -> Result<Application, ServiceError> {
        let loan = self
            .loans
            .get(&request.loan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("loan {}", request.loan_id)))?;

        let application =
            Application::submit(&applicant.email, &loan.id, &loan.title, request.amount);
        self.applications.insert(application.clone()).await?;
        info!(application_id = %application.id, loan_id = %loan.id, "application submitted");
        Ok(application)
    }

    pub async fn list_mine(&self, applicant: &Principal) -> Result<Vec<Application>, ServiceError> {
        Ok(self.applications.list_by_user(&applicant.email).await?)
    }

    pub async fn list_all(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, ServiceError> {
        Ok(self.applications.list_all(status).await?)
    }

    /// Approve or reject; callers are gated to managers before reaching this.
    pub async fn decide(
        &self,
        id: &str,
        decision: ApplicationStatus,
    ) -> Result<Application, ServiceError> {
        if !matches!(
            decision,
            ApplicationStatus::Approved | ApplicationStatus::Rejected
        ) {
            return Err(ServiceError::Validation(format!(
                "a decision must be approved or rejected, not {decision}"
            )));
        }
        self.transition(id, decision).await
    }

    /// Cancels a pending application on behalf of its owner.
    pub async fn cancel(&self, owner: &Principal, id: &str) -> Result<Application, ServiceError> {
        let current = self.load(id).await?;
        if current.user_email != owner.email {
            return Err(ServiceError::Forbidden(
                "only the applicant can cancel an application".to_string(),
            ));
        }
        self.transition(id, ApplicationStatus::Cancelled).await
    }

    async fn load(&self, id: &str) -> Result<Application, ServiceError> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("application {id}")))
    }

    async fn transition(
        &self,
        id: &str,
        to: ApplicationStatus,
    ) -> Result<Application, ServiceError> {
        let current = self.load(id).await?;
        let invalid = || ServiceError::InvalidTransition {
            from: current.status.to_string(),
            to: to.to_string(),
        };
        if !current.status.can_become(to) {
            return Err(invalid());
        }

        // Conditional on the status we just read; a concurrent decision makes this miss.
        let updated = self
            .applications
            .update_status(id, current.status, to)
            .await?
            .ok_or_else(invalid)?;
        info!(application_id = id, from = %current.status, to = %to, "application status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loan::Loan;
    use crate::domain::money::Amount;
    use crate::domain::ports::LoanStore;
    use crate::infrastructure::in_memory::{InMemoryApplicationStore, InMemoryLoanStore};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn service() -> ApplicationService {
        let loans = InMemoryLoanStore::new();
        loans
            .insert(Loan {
                id: "loan_1".into(),
                title: "Home Loan".into(),
                description: String::new(),
                category: String::new(),
                interest_rate: dec!(5),
                max_limit: dec!(10000),
                created_by: "m@example.com".into(),
                show_on_home: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        ApplicationService::new(Arc::new(InMemoryApplicationStore::new()), Arc::new(loans))
    }

    fn request(loan_id: &str) -> NewApplication {
        NewApplication {
            loan_id: loan_id.into(),
            amount: Amount::new(dec!(500)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_submit_copies_loan_title() {
        let service = service().await;
        let applicant = Principal::new("a@example.com");
        let app = service.submit(&applicant, request("loan_1")).await.unwrap();
        assert_eq!(app.loan_title, "Home Loan");
        assert_eq!(app.user_email, "a@example.com");
        assert_eq!(service.list_mine(&applicant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_unknown_loan() {
        let service = service().await;
        let result = service
            .submit(&Principal::new("a@example.com"), request("nope"))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_decision_is_final() {
        let service = service().await;
        let app = service
            .submit(&Principal::new("a@example.com"), request("loan_1"))
            .await
            .unwrap();

        let approved = service
            .decide(&app.id, ApplicationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);

        let again = service.decide(&app.id, ApplicationStatus::Rejected).await;
        assert!(matches!(again, Err(ServiceError::InvalidTransition { .. })));

        let cancel = service.decide(&app.id, ApplicationStatus::Cancelled).await;
        assert!(matches!(cancel, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_only_owner_cancels() {
        let service = service().await;
        let owner = Principal::new("a@example.com");
        let app = service.submit(&owner, request("loan_1")).await.unwrap();

        let stranger = service.cancel(&Principal::new("b@example.com"), &app.id).await;
        assert!(matches!(stranger, Err(ServiceError::Forbidden(_))));

        let cancelled = service.cancel(&owner, &app.id).await.unwrap();
        assert_eq!(cancelled.status, ApplicationStatus::Cancelled);
    }
}
