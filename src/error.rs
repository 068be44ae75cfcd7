use actix_web::{
    error::BlockingError,
    http::{header::ContentType, Method, StatusCode},
    HttpResponse, ResponseError,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::forms::FormErrors;
use crate::render;
use crate::tracking::ResolveError;

const FOREIGN_KEY_FAILED: &str = "FOREIGN KEY constraint failed";

/// Failures of one unit of store work.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("invalid submission")]
    Validation(FormErrors),

    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i32 },

    #[error("{0}")]
    Conflict(String),

    #[error("database is unavailable")]
    Unavailable,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: i32) -> Self {
        StoreError::NotFound { entity, id }
    }

    /// Whether the failure says something about the database's health, as
    /// opposed to the request's content. Only these trip the circuit breaker.
    pub(crate) fn is_outage(&self) -> bool {
        match self {
            StoreError::Pool(_) | StoreError::Unavailable => true,
            StoreError::Database(DieselError::DatabaseError(kind, _)) => matches!(
                kind,
                DatabaseErrorKind::UnableToSendCommand | DatabaseErrorKind::ClosedConnection
            ),
            StoreError::Database(DieselError::BrokenTransactionManager) => true,
            _ => false,
        }
    }

    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            ))
        )
    }

    /// SQLite reports RESTRICT failures with an unclassified kind, so the
    /// message is checked as well.
    pub(crate) fn is_foreign_key_violation(&self) -> bool {
        match self {
            StoreError::Database(DieselError::DatabaseError(kind, info)) => {
                matches!(kind, DatabaseErrorKind::ForeignKeyViolation)
                    || info.message().contains(FOREIGN_KEY_FAILED)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method {0} is not supported here")]
    MethodNotAllowed(Method),

    #[error("{0}")]
    Conflict(String),

    #[error("the database is unavailable, try again later")]
    Unavailable,

    #[error("internal error")]
    Internal,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type(ContentType::html())
            .body(render::error_page(self.status_code(), &self.to_string()))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::Conflict(message) => AppError::Conflict(message),
            StoreError::Unavailable => AppError::Unavailable,
            StoreError::Validation(errors) => {
                let message = errors
                    .iter()
                    .flat_map(|(field, messages)| {
                        messages.iter().map(move |message| format!("{field}: {message}"))
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                AppError::BadRequest(message)
            }
            other => {
                log::error!("store failure: {other}");
                AppError::Internal
            }
        }
    }
}
