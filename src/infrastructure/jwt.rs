use crate::domain::ports::IdentityVerifier;
use crate::domain::user::Principal;
use crate::error::AuthError;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by a bearer credential.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub email: String,
    pub exp: u64,
}

/// Verifies HS256-signed bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, bearer: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(bearer, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        let email = data.claims.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::InvalidCredential(
                "token carries no email".to_string(),
            ));
        }
        Ok(Principal::new(email))
    }
}
