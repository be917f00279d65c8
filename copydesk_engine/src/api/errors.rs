use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Nonce is not strictly increasing.")]
    InvalidNonce,
    #[error("User not found")]
    UserNotFound,
    #[error("User requested at least {0} roles that are not allowed")]
    RoleNotAllowed(usize),
    #[error("The requested role does not exist")]
    RoleNotFound,
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("{0}")]
    Forbidden(#[from] crate::policy::PolicyError),
}

#[derive(Debug, Clone, Error)]
pub enum WriterApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested application does not exist")]
    ApplicationNotFound,
    #[error("The application has already been decided")]
    AlreadyDecided,
    #[error("An application for this user is already pending or approved")]
    DuplicateApplication,
    #[error("Invalid application: {0}")]
    InvalidApplication(String),
    #[error("{0}")]
    Forbidden(#[from] crate::policy::PolicyError),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::Error> for WriterApiError {
    fn from(e: sqlx::Error) -> Self {
        WriterApiError::DatabaseError(e.to_string())
    }
}
