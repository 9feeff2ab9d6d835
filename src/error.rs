use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Every failure a handler can surface to a client. Infrastructure errors
/// (database, object store, token signing) are folded into `Storage` at the
/// handler boundary; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("User already exists")]
    DuplicateAccount,
    #[error("User doesn't exist")]
    NotFound,
    #[error("Please provide the correct information")]
    InvalidCredentials,
    #[error("Invalid or expired activation token")]
    InvalidOrExpiredTicket,
    #[error("Passwords don't match with each other")]
    PasswordMismatch,
    #[error("{0} address already exists")]
    DuplicateAddressType(String),
    #[error("Failed to send activation email")]
    MailDelivery(#[source] anyhow::Error),
    #[error("Internal error")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateAccount
            | ApiError::InvalidOrExpiredTicket
            | ApiError::PasswordMismatch
            | ApiError::DuplicateAddressType(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MailDelivery(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Storage(e.into())
    }
}
