//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! The error taxonomy mirrors how checkout failures differ in consequence:
//! validation never reaches the network, backend failures are retryable,
//! provider failures mean the buyer already saw provider UI, and a blocked
//! consent gate is a precondition rather than a failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use atelier_core::ConsentCategory;

use crate::db::RepositoryError;
use crate::payments::BackendError;
use crate::services::auth::AuthError;

/// A request rejected before any network call because required fields are
/// missing. Carries the offending field names for the client to highlight.
#[derive(Debug, Clone, Error)]
#[error("missing required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    /// Field names that were empty or absent.
    pub missing: Vec<&'static str>,
}

impl ValidationError {
    /// Build from a list of missing field names.
    ///
    /// Callers must pass a non-empty list; an empty one means the input was
    /// actually valid and rejecting it would be wrong.
    #[must_use]
    pub const fn new(missing: Vec<&'static str>) -> Self {
        Self { missing }
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required input fields are missing; no network call was made.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The operation needs a consent category the buyer has not granted.
    #[error("Consent required for category: {0}")]
    ConsentRequired(ConsentCategory),

    /// Commerce backend call failed (retryable).
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A payment provider reported failure after its own UI ran.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body returned to the client.
///
/// `kind` is a stable discriminant the front end branches on; the optional
/// fields carry the actionable detail (which fields to fix, where to grant
/// consent) so no failure dead-ends.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consent_category: Option<ConsentCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grant_path: Option<&'static str>,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Backend(_) | Self::Provider(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConsentRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            Self::Backend(_) | Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::AccountDeactivated => StatusCode::GONE,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidToken => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = match &self {
            Self::Validation(err) => ErrorBody {
                kind: "validation",
                error: err.to_string(),
                missing_fields: Some(err.missing.clone()),
                consent_category: None,
                grant_path: None,
                retryable: false,
            },
            Self::ConsentRequired(category) => ErrorBody {
                kind: "consent_required",
                error: format!("This step needs the '{category}' cookie category enabled"),
                missing_fields: None,
                consent_category: Some(*category),
                grant_path: Some("/consent/preferences"),
                retryable: false,
            },
            Self::Backend(_) => ErrorBody {
                kind: "backend",
                // Don't expose backend error details to clients
                error: "The order service is unavailable, please try again".to_string(),
                missing_fields: None,
                consent_category: None,
                grant_path: None,
                retryable: true,
            },
            Self::Provider(_) => ErrorBody {
                kind: "provider",
                error: "Payment failed".to_string(),
                missing_fields: None,
                consent_category: None,
                grant_path: None,
                retryable: true,
            },
            Self::Database(_) | Self::Internal(_) => ErrorBody {
                kind: "internal",
                error: "Internal server error".to_string(),
                missing_fields: None,
                consent_category: None,
                grant_path: None,
                retryable: false,
            },
            Self::Auth(err) => ErrorBody {
                kind: "auth",
                error: match err {
                    AuthError::InvalidCredentials | AuthError::UserNotFound => {
                        "Invalid credentials".to_string()
                    }
                    AuthError::UserAlreadyExists => {
                        "An account with this email already exists".to_string()
                    }
                    AuthError::AccountDeactivated => {
                        "This account was deactivated; it can be restored from the login page"
                            .to_string()
                    }
                    AuthError::WeakPassword(msg) => msg.clone(),
                    AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                    AuthError::InvalidToken => "Verification link is invalid or expired".to_string(),
                    _ => "Authentication error".to_string(),
                },
                missing_fields: None,
                consent_category: None,
                grant_path: None,
                retryable: false,
            },
            other => ErrorBody {
                kind: "request",
                error: other.to_string(),
                missing_fields: None,
                consent_category: None,
                grant_path: None,
                retryable: matches!(other, Self::RateLimited),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for buyer actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_fields() {
        let err = ValidationError::new(vec!["email", "phone"]);
        assert_eq!(err.to_string(), "missing required fields: email, phone");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::Validation(ValidationError::new(vec!["email"]))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::ConsentRequired(ConsentCategory::Targeting)),
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Provider("declined".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
