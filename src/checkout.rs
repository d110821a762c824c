//! Checkout session endpoints.
//!
//! | Method | Path | Body | Success |
//! |--------|------|------|---------|
//! | `POST` | `/api/create-payment-link` | `{ "userEmail", "userId" }` | `{ "checkoutUrl" }` |
//! | `POST` | `/api/checkout` | none | `{ "checkoutUrl" }` |
//!
//! Failures answer with a non-2xx status and `{ "error": "<generic message>" }`.
//! Billing provider details are logged and never sent to the client.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::billing::{BillingError, CheckoutRequest};
use crate::server::AppState;

pub const CHECKOUT_FAILED: &str = "Failed to create checkout session.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON error with a client-safe message.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        tracing::error!(error = %err, "checkout session creation failed");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: CHECKOUT_FAILED.to_string(),
        }
    }
}

/// Handler for `POST /api/create-payment-link`.
pub async fn handle_create_payment_link(
    State(state): State<AppState>,
    body: Result<Json<PaymentLinkRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(body) = body.map_err(|e| bad_request(format!("invalid request body: {}", e.body_text())))?;

    let user_email = required(body.user_email, "userEmail")?;
    let user_id = required(body.user_id, "userId")?;

    let session = state
        .billing
        .create_checkout(CheckoutRequest {
            user_id: Some(user_id),
            user_email: Some(user_email),
        })
        .await?;

    tracing::info!(transaction = ?session.transaction_id, "created personalised checkout session");
    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
    }))
}

/// Handler for `POST /api/checkout`: fixed price, no customer details.
pub async fn handle_checkout(
    State(state): State<AppState>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let session = state
        .billing
        .create_checkout(CheckoutRequest::default())
        .await?;
    tracing::info!(transaction = ?session.transaction_id, "created checkout session");
    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
    }))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", field)))
}
