use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use copydesk_engine::{AccountApiError, AuthApiError, WorkflowError, WriterApiError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Auth token signature invalid or not provided")]
    CouldNotDeserializeAuthToken,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Could not serialize access token. {0}")]
    CouldNotSerializeAccessToken(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Access denied.")]
    InsufficientPermissions,
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Conflicting order state. {0}")]
    ConflictError(String),
    #[error("The payment provider could not be reached. Please try again.")]
    PaymentProviderError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializeAuthToken => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CouldNotSerializeAccessToken(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::ConflictError(_) => StatusCode::CONFLICT,
            Self::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Forbidden responses stay generic on purpose; the denial reason is only logged server-side.
        // Provider failures likewise hide the detail behind a "try again" message.
        if let Self::PaymentProviderError(detail) = self {
            error!("💻️ Payment provider failure: {detail}");
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Login token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Login token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found.")]
    AccountNotFound,
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::InvalidNonce => Self::AuthenticationError(AuthError::ValidationError(e.to_string())),
            AuthApiError::UserNotFound => Self::AuthenticationError(AuthError::AccountNotFound),
            AuthApiError::RoleNotAllowed(_) => {
                Self::AuthenticationError(AuthError::InsufficientPermissions(e.to_string()))
            },
            AuthApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            AuthApiError::RoleNotFound => {
                Self::BackendError(format!("Role definitions in Database and Code have diverged. {e}"))
            },
        }
    }
}

impl From<WorkflowError> for ServerError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(v) => Self::ValidationError(v.to_string()),
            WorkflowError::Forbidden(p) => {
                // The reason is deliberately dropped from the response.
                log::debug!("💻️ Policy denial: {p}");
                Self::InsufficientPermissions
            },
            WorkflowError::OrderNotFound(oid) => Self::NoRecordFound(format!("Order {oid}")),
            WorkflowError::FileNotFound(id) => Self::NoRecordFound(format!("File {id}")),
            WorkflowError::Conflict(msg) => Self::ConflictError(msg),
            WorkflowError::StaleState { expected, actual } => {
                Self::ConflictError(format!("order moved from {expected} to {actual}; refetch and retry"))
            },
            WorkflowError::TransitionForbidden { from, to } => {
                Self::ConflictError(format!("an order cannot move from {from} to {to}"))
            },
            WorkflowError::WriterNotEligible(msg) => Self::ConflictError(msg),
            WorkflowError::DatabaseError(e) => Self::BackendError(e),
            WorkflowError::AccountError(e) => ServerError::from(e),
            WorkflowError::AuthError(e) => ServerError::from(e),
            WorkflowError::WriterError(e) => ServerError::from(e),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::DatabaseError(e) => Self::BackendError(e),
            AccountApiError::QueryError(e) => Self::ValidationError(e),
            AccountApiError::Forbidden(p) => {
                log::debug!("💻️ Policy denial: {p}");
                Self::InsufficientPermissions
            },
        }
    }
}

impl From<WriterApiError> for ServerError {
    fn from(e: WriterApiError) -> Self {
        match e {
            WriterApiError::DatabaseError(e) => Self::BackendError(e),
            WriterApiError::ApplicationNotFound => Self::NoRecordFound("Writer application".into()),
            WriterApiError::AlreadyDecided => Self::ConflictError("the application has already been decided".into()),
            WriterApiError::DuplicateApplication => {
                Self::ConflictError("an application for this user is already pending or approved".into())
            },
            WriterApiError::InvalidApplication(msg) => Self::ValidationError(msg),
            WriterApiError::Forbidden(p) => {
                log::debug!("💻️ Policy denial: {p}");
                Self::InsufficientPermissions
            },
        }
    }
}
