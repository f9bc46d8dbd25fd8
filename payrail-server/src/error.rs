//! JSON error envelope for the HTTP surface.
//!
//! Every failure maps to a status class and a `{ "error", "message" }`
//! body: 4xx for caller-correctable conditions, 5xx for server/network
//! conditions. No partial or ambiguous state is ever exposed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use payrail::error::PaymentError;

/// Wrapper turning a [`PaymentError`] into an HTTP response.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub PaymentError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PaymentError::InputInvalid(_)
            | PaymentError::DatasetNotPayable(_)
            | PaymentError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            PaymentError::AccountNotReady(_) => StatusCode::NOT_FOUND,
            PaymentError::ConfirmationFailed(_) | PaymentError::DeadlineExceeded(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            PaymentError::AmountMismatch { .. }
            | PaymentError::WrongReference { .. }
            | PaymentError::WrongSeller { .. }
            | PaymentError::Publish { .. }
            | PaymentError::LedgerConflict(_)
            | PaymentError::Ledger(_)
            | PaymentError::Rpc(_)
            | PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let response =
            ApiError(PaymentError::DatasetNotPayable("d".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            ApiError(PaymentError::AccountNotReady("missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn integrity_errors_map_to_500() {
        let response = ApiError(PaymentError::AmountMismatch {
            expected: 2_500_000,
            actual: 2_499_999,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn confirmation_failures_map_to_504() {
        let response =
            ApiError(PaymentError::ConfirmationFailed("expired".into())).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
