use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[source] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[source] DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    /// Uniqueness failures caught by the database rather than a pre-check.
    pub fn duplicate() -> Self {
        AppError::Conflict("a record with the same unique value already exists".into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                "internal_error"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Constraint violations that slip past the explicit checks (concurrent writers)
// still surface as client errors.
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!(%detail, "unique constraint violated");
                AppError::duplicate()
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::NotFound("referenced record not found".into())
            }
            _ => AppError::OrmError(err),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                tracing::debug!(detail = %db_err.message(), "unique constraint violated");
                return AppError::duplicate();
            }
            if db_err.is_foreign_key_violation() {
                return AppError::NotFound("referenced record not found".into());
            }
        }
        AppError::DbError(err)
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorData {
    pub code: String,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                code: self.code().to_string(),
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_distinct_statuses() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST, "validation_error"),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT, "conflict"),
            (AppError::not_found("Order"), StatusCode::NOT_FOUND, "not_found"),
            (AppError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED, "unauthorized"),
            (AppError::Forbidden, StatusCode::FORBIDDEN, "forbidden"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("secret connection string"));
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn plain_orm_errors_stay_internal() {
        let err: AppError = DbErr::Custom("boom".into()).into();
        assert!(matches!(err, AppError::OrmError(_)));
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(
            AppError::not_found("Product").to_string(),
            "Not Found: Product not found"
        );
    }
}
