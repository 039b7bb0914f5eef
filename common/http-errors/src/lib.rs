use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

/// Uniform wire shape for every error emitted by the API.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Bad input shape or value; rejected before any external call.
    Validation { message: String },
    /// Bad credentials or a missing/invalid/expired/revoked token.
    Authentication { message: String, details: Option<String> },
    /// Authenticated but the wrong role.
    Forbidden { message: String },
    NotFound { message: String },
    /// Reserved; no handler currently produces it.
    Conflict { message: String },
    /// A required backing-store or provider call failed. Detail is surfaced
    /// since this is an internal-facing deployment.
    Dependency { message: String, details: Option<String> },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), details: None }
    }

    pub fn authentication_detail(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), details: Some(details.into()) }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn dependency<E: std::fmt::Display>(message: impl Into<String>, source: E) -> Self {
        Self::Dependency { message: message.into(), details: Some(source.to_string()) }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Dependency { message: message.into(), details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::Validation { message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { error: message, details: None },
                "validation",
            ),
            ApiError::Authentication { message, details } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { error: message, details },
                "authentication",
            ),
            ApiError::Forbidden { message } => (
                StatusCode::FORBIDDEN,
                ErrorBody { error: message, details: None },
                "forbidden",
            ),
            ApiError::NotFound { message } => (
                StatusCode::NOT_FOUND,
                ErrorBody { error: message, details: None },
                "not_found",
            ),
            ApiError::Conflict { message } => (
                StatusCode::CONFLICT,
                ErrorBody { error: message, details: None },
                "conflict",
            ),
            ApiError::Dependency { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { error: message, details },
                "dependency",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
