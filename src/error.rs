use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanLinkError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoanLinkError>;

/// Failures raised by document store adapters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("duplicate {field} in {collection}: {value}")]
    Duplicate {
        collection: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Failures raised by the checkout gateway adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("checkout session {0} not found")]
    SessionNotFound(String),
    #[error("checkout gateway unavailable: {0}")]
    Unavailable(String),
    #[error("checkout gateway rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,
    #[error("invalid bearer credential: {0}")]
    InvalidCredential(String),
}

/// Failures of the listing, application, and user use cases.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LoanLinkError> for ServiceError {
    fn from(err: LoanLinkError) -> Self {
        match err {
            LoanLinkError::StoreError(store) => ServiceError::Store(store),
            LoanLinkError::ValidationError(msg) => ServiceError::Validation(msg),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}

/// The error kinds a caller of the payment reconciler can observe.
///
/// Everything the gateway or the store reports is folded into one of these at the
/// reconciler boundary. Benign conditions (`NotPaid`, `AlreadyRecorded`, duplicate ledger
/// inserts, broken application linkage) are outcomes, not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("checkout gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("checkout session {0} not found")]
    SessionNotFound(String),
    #[error("checkout session {0} is paid but carries no payment intent")]
    MalformedSession(String),
    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("invalid checkout request: {0}")]
    InvalidRequest(String),
}

impl ReconcileError {
    /// Stable kind name surfaced in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::GatewayUnavailable(_) => "GatewayUnavailable",
            ReconcileError::SessionNotFound(_) => "SessionNotFound",
            ReconcileError::MalformedSession(_) => "MalformedSession",
            ReconcileError::StoreUnavailable(_) => "StoreUnavailable",
            ReconcileError::InvalidRequest(_) => "InvalidRequest",
        }
    }
}

impl From<GatewayError> for ReconcileError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::SessionNotFound(id) => ReconcileError::SessionNotFound(id),
            GatewayError::Unavailable(msg) => ReconcileError::GatewayUnavailable(msg),
            GatewayError::Rejected(msg) => ReconcileError::InvalidRequest(msg),
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::StoreUnavailable(err)
    }
}
