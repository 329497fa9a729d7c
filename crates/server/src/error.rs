//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::CheckoutError;

/// Seconds a client should wait before retrying a transaction that lost a race.
const RETRY_AFTER_SECS: &str = "1";

/// Application-level error type for the checkout server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service operation failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// No (or an unparseable) caller identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        Self::Checkout(CheckoutError::Repository(e))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => checkout_status(err),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

const fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::UserNotFound
        | CheckoutError::ProductNotFound
        | CheckoutError::ItemNotFound
        | CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
        CheckoutError::Unauthorized => StatusCode::FORBIDDEN,
        CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CheckoutError::ProductUnavailable { .. }
        | CheckoutError::EmptyCart
        | CheckoutError::InvalidState { .. }
        | CheckoutError::InvalidTransition { .. }
        | CheckoutError::InvalidQuantity
        | CheckoutError::InvalidShippingAddress => StatusCode::BAD_REQUEST,
        CheckoutError::Repository(RepositoryError::Retryable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %self, "Transaction conflict, client may retry");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Checkout(CheckoutError::Repository(RepositoryError::Retryable(_))) => {
                "Temporary conflict, please retry".to_string()
            }
            Self::Checkout(CheckoutError::Repository(RepositoryError::Conflict(_))) => {
                "Conflicting request".to_string()
            }
            Self::Checkout(CheckoutError::Repository(_)) => "Internal server error".to_string(),
            Self::Checkout(err) => err.to_string(),
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use checkout_core::{OrderStatus, ProductId};

    use super::*;

    fn status_of(err: CheckoutError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_not_found_kinds_map_to_404() {
        for err in [
            CheckoutError::UserNotFound,
            CheckoutError::ProductNotFound,
            CheckoutError::ItemNotFound,
            CheckoutError::OrderNotFound,
        ] {
            assert_eq!(status_of(err), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_business_rejections() {
        assert_eq!(status_of(CheckoutError::Unauthorized), StatusCode::FORBIDDEN);
        assert_eq!(status_of(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CheckoutError::InvalidState {
                status: OrderStatus::Shipped,
                action: "cancel",
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::InsufficientStock {
                product_id: ProductId::new_v4(),
                requested: 2,
                available: 1,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_retryable_conflict_sets_retry_after() {
        let response =
            AppError::from(RepositoryError::Retryable("deadlock".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
    }

    #[test]
    fn test_internal_errors_are_500() {
        let response =
            AppError::from(RepositoryError::DataCorruption("bad row".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
