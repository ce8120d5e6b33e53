//! Provider callbacks. The raw body is verified before it is parsed, and
//! outcomes are reported through status codes.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use super::AppState;
use crate::payment::{self, PaymentEvent, ReconcileError};
use crate::storage::StorageError;
use crate::users::{self, IdentityEvent};
use crate::webhook::{SignatureError, WebhookVerifier};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    NotConfigured,
    #[error("Webhook Error: {0}")]
    Signature(#[from] SignatureError),
    #[error("Webhook Error: invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Signature(_) | Self::Payload(_) | Self::Reconcile(ReconcileError::MissingBookingId) => {
                StatusCode::BAD_REQUEST
            }
            Self::Reconcile(ReconcileError::BookingNotFound(_)) => StatusCode::NOT_FOUND,
            Self::NotConfigured | Self::Reconcile(ReconcileError::Storage(_)) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "webhook processing failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "webhook rejected");
        }
        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}

fn verify(
    verifier: Option<&Arc<dyn WebhookVerifier>>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), WebhookError> {
    verifier.ok_or(WebhookError::NotConfigured)?.verify(headers, body)?;
    Ok(())
}

/// `POST /api/clerk`: identity-provider user sync.
pub async fn identity_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WebhookError> {
    verify(state.identity_webhook.as_ref(), &headers, &body)?;
    let event: IdentityEvent = serde_json::from_slice(&body)?;
    let storage = state.db.storage().await?;
    users::apply_identity_event(storage, &event)?;
    Ok(Json(json!({ "success": true, "message": "Webhook received" })))
}

/// `POST /api/stripe`: payment reconciliation.
pub async fn payment_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WebhookError> {
    verify(state.payment_webhook.as_ref(), &headers, &body)?;
    let event: PaymentEvent = serde_json::from_slice(&body)?;
    let storage = state.db.storage().await?;
    payment::reconcile(storage, &event)?;
    Ok(Json(json!({ "received": true })))
}
