use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{AppState, CurrentUser, RestResponse, RestResult};
use crate::booking::NewBooking;
use crate::dashboard::{self, DashboardData, RECENT_BOOKINGS_LIMIT};
use crate::error::AppError;
use crate::models::{deserialize_stay_date, BookingDetails};
use crate::payment;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub room: String,
    #[serde(deserialize_with = "deserialize_stay_date")]
    pub check_in_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_stay_date")]
    pub check_out_date: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_available: bool,
}

pub async fn availability_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AvailabilityRequest>, JsonRejection>,
) -> RestResult<Availability> {
    let request = state.body(payload)?;
    if request.room.trim().is_empty() {
        return Err(state.reject(AppError::validation("Room is required")));
    }
    let is_available = state
        .bookings
        .check_availability(&request.room, request.check_in_date, request.check_out_date)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(RestResponse::ok(Availability { is_available }))
}

/// Guest count as a number or a numeric string.
fn deserialize_guests<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Guests {
        Number(u32),
        Text(String),
    }
    match Guests::deserialize(deserializer)? {
        Guests::Number(n) => Ok(n),
        Guests::Text(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn one_guest() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub room: String,
    #[serde(deserialize_with = "deserialize_stay_date")]
    pub check_in_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_stay_date")]
    pub check_out_date: DateTime<Utc>,
    #[serde(default = "one_guest", deserialize_with = "deserialize_guests")]
    pub guests: u32,
    /// Overrides the account address for the confirmation mail.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub booking_id: String,
}

pub async fn book_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> RestResult<Created> {
    let request = state.body(payload)?;
    let booking = state
        .bookings
        .create_booking(NewBooking {
            user_id: user.id,
            room_id: request.room,
            check_in: request.check_in_date,
            check_out: request.check_out_date,
            guests: request.guests,
            recipient_email: request.email.filter(|e| !e.trim().is_empty()),
        })
        .await
        .map_err(|e| state.reject(e))?;
    Ok(RestResponse::with_message(
        "Booking created",
        Created { booking_id: booking.id },
    ))
}

#[derive(Serialize)]
pub struct BookingList {
    pub bookings: Vec<BookingDetails>,
}

pub async fn user_bookings_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> RestResult<BookingList> {
    let bookings = state
        .bookings
        .list_user_bookings(&user.id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(RestResponse::ok(BookingList { bookings }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub dashboard_data: DashboardData,
}

pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> RestResult<Dashboard> {
    let listing = state
        .bookings
        .list_hotel_bookings(&owner.id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(match listing {
        Some(listing) => RestResponse::ok(Dashboard {
            dashboard_data: dashboard::summarize(listing, RECENT_BOOKINGS_LIMIT),
        }),
        None => RestResponse::with_message(
            "No Hotel found",
            Dashboard {
                dashboard_data: DashboardData::default(),
            },
        ),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub booking_id: String,
}

#[derive(Serialize)]
pub struct CheckoutUrl {
    pub url: String,
}

pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> RestResult<CheckoutUrl> {
    let request = state.body(payload)?;
    let gateway = state
        .payments
        .clone()
        .ok_or_else(|| state.reject(AppError::upstream("Payments are not configured")))?;
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| state.reject(AppError::validation("Origin header is required")))?;

    let storage = state.storage().await?;
    let url = payment::start_checkout(
        storage,
        gateway.as_ref(),
        &user.id,
        &request.booking_id,
        origin,
        &state.payment_currency,
    )
    .await
    .map_err(|e| state.reject(e))?;
    Ok(RestResponse::ok(CheckoutUrl { url }))
}
