//! # API Error Types
//!
//! Every client-side failure is reported as HTTP 400 with a flat body
//! `{"error": message, "code": KIND}`; the `code` distinguishes the kind.
//! Internal failures are 500 and never expose their message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use aqlhr_gosi::GosiError;
use aqlhr_kpi::KpiError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable kind: `UNAUTHORIZED`, `INVALID_ARGUMENT`,
    /// `NOT_FOUND` or `INTERNAL`.
    pub code: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed input: bad UUID, missing field, bad JSON, duplicate row.
    #[error("{0}")]
    InvalidArgument(String),

    /// No matching KPI, rate, employee or configuration.
    #[error("{0}")]
    NotFound(String),

    /// Database or other server-side failure. Logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::BAD_REQUEST, "UNAUTHORIZED"),
            Self::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            Self::NotFound(_) => (StatusCode::BAD_REQUEST, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }

    pub(crate) fn body(&self) -> ErrorBody {
        let (_, code) = self.status_and_code();
        let error = match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error,
            code: code.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        (status, Json(self.body())).into_response()
    }
}

impl From<aqlhr_core::ValidationError> for AppError {
    fn from(err: aqlhr_core::ValidationError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<GosiError> for AppError {
    fn from(err: GosiError) -> Self {
        match &err {
            GosiError::EmployeeNotFound(_)
            | GosiError::ConfigNotFound(_)
            | GosiError::RateNotFound { .. } => Self::NotFound(err.to_string()),
            GosiError::DuplicateRate { .. } | GosiError::InvalidPolicy(_) => {
                Self::InvalidArgument(err.to_string())
            }
        }
    }
}

impl From<KpiError> for AppError {
    fn from(err: KpiError) -> Self {
        match &err {
            KpiError::KpiNotFound { .. } | KpiError::ModuleNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            KpiError::InvalidDefinition(_)
            | KpiError::DuplicateKpiOrder(_)
            | KpiError::DuplicateKpiName(_)
            | KpiError::InvalidValue(_) => Self::InvalidArgument(err.to_string()),
        }
    }
}
