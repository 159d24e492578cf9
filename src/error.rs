use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("this time is already booked")]
    SlotConflict,

    #[error("{0}")]
    PolicyViolation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("cannot change status from {from} to {to}")]
    IllegalTransition { from: &'static str, to: &'static str },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::SlotConflict => "slot_conflict",
            Error::PolicyViolation(_) => "policy_violation",
            Error::Unauthorized(_) => "unauthorized",
            Error::IllegalTransition { .. } => "illegal_transition",
            Error::Database(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for Error {
    // A unique-index violation is the storage layer arbitrating a booking
    // race; everything else is a real database failure.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return Error::SlotConflict;
            }
        }
        Error::Database(err)
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::SlotConflict => StatusCode::CONFLICT,
            Error::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::IllegalTransition { .. } => StatusCode::CONFLICT,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Error::Database(err) => {
                log::error!("database error: {err}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": { "code": self.code(), "message": message }
        }))
    }
}
