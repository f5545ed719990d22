use crate::domain::ports::UserStoreRef;
use crate::domain::user::{Principal, Role, User};
use crate::error::ServiceError;
use tracing::info;

/// Resolves roles for authenticated principals and manages user records.
#[derive(Clone)]
pub struct RoleAuthority {
    users: UserStoreRef,
}

impl RoleAuthority {
    pub fn new(users: UserStoreRef) -> Self {
        Self { users }
    }

    /// Unknown principals are plain users.
    pub async fn role_of(&self, principal: &Principal) -> Result<Role, ServiceError> {
        Ok(self
            .users
            .get(&principal.email)
            .await?
            .map(|user| user.role)
            .unwrap_or_default())
    }

    /// Registers the principal on first sign-in. A known user is returned as stored.
    pub async fn register(&self, principal: &Principal, name: &str) -> Result<User, ServiceError> {
        let user = self
            .users
            .upsert(User::new(&principal.email, name.trim()))
            .await?;
        info!(email = %user.email, role = %user.role, "user registered");
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.list().await?)
    }

    pub async fn set_role(&self, email: &str, role: Role) -> Result<User, ServiceError> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .set_role(&email, role)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {email}")))?;
        info!(email = %user.email, role = %role, "user role changed");
        Ok(user)
    }
}
