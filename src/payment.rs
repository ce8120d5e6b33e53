//! Payment capture: hosted checkout sessions out, completion events in.
//!
//! Reconciliation only ever overwrites `isPaid`/`paymentMethod`, so
//! replaying an event leaves the booking unchanged.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::Booking;
use crate::storage::{Storage, StorageError, StorageResult};

/// Recorded as `paymentMethod` on reconciled bookings.
pub const PAYMENT_METHOD: &str = "Stripe";

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventObject {
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl PaymentEvent {
    fn booking_id(&self) -> Option<&str> {
        self.data
            .object
            .metadata
            .as_ref()
            .and_then(|m| m.get("bookingId"))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, PartialEq)]
pub enum Reconciliation {
    Paid(Booking),
    /// Event acknowledged without touching any booking.
    Ignored,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("No bookingId found")]
    MissingBookingId,
    #[error("Booking not found")]
    BookingNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Mark a booking paid. `None` if it does not exist.
pub fn mark_paid(storage: &Storage, booking_id: &str) -> StorageResult<Option<Booking>> {
    let Some(mut booking) = storage.get_booking(booking_id)? else {
        return Ok(None);
    };
    booking.is_paid = true;
    booking.payment_method = Some(PAYMENT_METHOD.to_string());
    storage.put_booking(&booking)?;
    Ok(Some(booking))
}

/// Apply a verified gateway event.
pub fn reconcile(storage: &Storage, event: &PaymentEvent) -> Result<Reconciliation, ReconcileError> {
    match event.kind.as_str() {
        CHECKOUT_COMPLETED => {
            let booking_id = event.booking_id().ok_or_else(|| {
                warn!(event = ?event.id, "checkout completed without bookingId metadata");
                ReconcileError::MissingBookingId
            })?;
            let booking = mark_paid(storage, booking_id)?
                .ok_or_else(|| ReconcileError::BookingNotFound(booking_id.to_string()))?;
            info!(booking = %booking.id, "booking marked paid");
            Ok(Reconciliation::Paid(booking))
        }
        PAYMENT_SUCCEEDED => {
            let Some(booking_id) = event.booking_id() else {
                return Ok(Reconciliation::Ignored);
            };
            match mark_paid(storage, booking_id)? {
                Some(booking) => {
                    info!(booking = %booking.id, "booking marked paid from payment intent");
                    Ok(Reconciliation::Paid(booking))
                }
                None => {
                    warn!(booking = %booking_id, "payment intent references unknown booking");
                    Ok(Reconciliation::Ignored)
                }
            }
        }
        other => {
            info!(kind = %other, "ignoring payment event");
            Ok(Reconciliation::Ignored)
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub booking_id: String,
    pub product_name: String,
    /// Amount in the currency's minor unit (cents).
    pub unit_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout and return the URL to send the guest to.
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String, PaymentError>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

#[derive(Deserialize)]
struct CheckoutSession {
    url: String,
}

impl StripeGateway {
    pub fn new(client: reqwest::Client, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String, PaymentError> {
        let unit_amount = request.unit_amount.to_string();
        // bookingId goes on both the session and its payment intent so either
        // completion event can be reconciled.
        let form = [
            ("mode", "payment"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", request.currency.as_str()),
            ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
            ("line_items[0][price_data][product_data][name]", request.product_name.as_str()),
            ("metadata[bookingId]", request.booking_id.as_str()),
            ("payment_intent_data[metadata][bookingId]", request.booking_id.as_str()),
        ];
        let response = self
            .client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let session: CheckoutSession = response.json().await?;
        Ok(session.url)
    }
}

/// Start payment for one of the caller's unpaid bookings.
pub async fn start_checkout(
    storage: &Storage,
    gateway: &dyn PaymentGateway,
    user_id: &str,
    booking_id: &str,
    origin: &str,
    currency: &str,
) -> AppResult<String> {
    let booking = storage
        .get_booking(booking_id)?
        .filter(|b| b.user_id == user_id)
        .ok_or_else(|| AppError::not_found("Booking not found"))?;
    if booking.is_paid {
        return Err(AppError::validation("Booking is already paid"));
    }

    let room = storage.get_room(&booking.room_id)?;
    let hotel = storage.get_hotel(&booking.hotel_id)?;
    let product_name = match (&hotel, &room) {
        (Some(hotel), Some(room)) => format!("{} - {}", hotel.name, room.room_type),
        (Some(hotel), None) => hotel.name.clone(),
        _ => "Hotel booking".to_string(),
    };

    let origin = origin.trim_end_matches('/');
    let request = CheckoutRequest {
        booking_id: booking.id.clone(),
        product_name,
        unit_amount: (booking.total_price * 100.0).round() as i64,
        currency: currency.to_string(),
        success_url: format!("{origin}/loader/my-bookings"),
        cancel_url: format!("{origin}/my-bookings"),
    };
    gateway
        .create_checkout_session(request)
        .await
        .map_err(|e| AppError::upstream(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records requests and returns a fixed URL.
    #[derive(Default)]
    pub struct FakeGateway {
        pub requests: Mutex<Vec<CheckoutRequest>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String, PaymentError> {
            let url = format!("https://checkout.test/{}", request.booking_id);
            self.requests.lock().unwrap().push(request);
            Ok(url)
        }
    }
}
