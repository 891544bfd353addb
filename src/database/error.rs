use std::fmt::Display;

use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

/// Every failure the service can surface to a client.
///
/// The first five variants are client errors and map onto a distinct HTTP
/// status; `Internal` covers storage, cache and io failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Display) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Permission(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for Error {}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => match e.code().map(|code| code.into_owned()).as_deref() {
                // unique_violation
                Some("23505") => Self::conflict(format!(
                    "Duplicate entry ({})",
                    e.constraint().unwrap_or("unique constraint")
                )),
                // foreign_key_violation
                Some("23503") => Self::not_found("Referenced entity does not exist"),
                // check_violation
                Some("23514") => Self::validation(
                    "non_field_errors",
                    format!(
                        "Constraint violated ({})",
                        e.constraint().unwrap_or("check constraint")
                    ),
                ),
                _ => Self::internal(e),
            },
            sqlx::Error::RowNotFound => Self::not_found("RowNotFound"),
            sqlx::Error::PoolTimedOut => Self::internal("Pool timed out"),
            sqlx::Error::PoolClosed => Self::internal("Pool closed"),
            sqlx::Error::WorkerCrashed => Self::internal("Worker crashed"),
            e => Self::internal(e),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::internal(value)
    }
}

impl From<redis::RedisError> for Error {
    fn from(value: redis::RedisError) -> Self {
        Self::internal(format!("{:?} - {:?}", value.code(), value.detail()))
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::internal(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_its_own_status() {
        assert_eq!(
            Error::validation("cooking_time", "too small").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::permission("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(Error::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::internal("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_names_field() {
        let e = Error::validation("ingredients", "Ingredient repeats");
        assert_eq!(e.to_string(), "ingredients: Ingredient repeats");
    }

    #[test]
    fn test_row_not_found_is_not_found() {
        assert!(matches!(
            Error::from(sqlx::Error::RowNotFound),
            Error::NotFound(_)
        ));
    }
}
