use crate::domain::loan::{Loan, NewLoan};
use crate::domain::ports::LoanStoreRef;
use crate::domain::user::Principal;
use crate::error::ServiceError;
use tracing::info;

/// Number of listings shown on the landing page.
pub const HOME_LISTINGS: usize = 6;

#[derive(Clone)]
pub struct LoanCatalog {
    loans: LoanStoreRef,
}

impl LoanCatalog {
    pub fn new(loans: LoanStoreRef) -> Self {
        Self { loans }
    }

    pub async fn publish(&self, manager: &Principal, loan: NewLoan) -> Result<Loan, ServiceError> {
        let loan = loan.into_loan(&manager.email)?;
        self.loans.insert(loan.clone()).await?;
        info!(loan_id = %loan.id, created_by = %manager.email, "loan published");
        Ok(loan)
    }

    pub async fn list(&self) -> Result<Vec<Loan>, ServiceError> {
        Ok(self.loans.list().await?)
    }

    pub async fn home(&self) -> Result<Vec<Loan>, ServiceError> {
        Ok(self.loans.list_home(HOME_LISTINGS).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Loan, ServiceError> {
        self.loans
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("loan {id}")))
    }
}
