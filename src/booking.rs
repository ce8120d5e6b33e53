//! Booking lifecycle: availability, pricing, persistence and confirmation mail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::availability;
use crate::error::{AppError, AppResult};
use crate::mailer::{self, Mailer};
use crate::models::{is_deliverable_email, Booking, BookingDetails};
use crate::storage::{Database, Storage};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Nights billed for a stay: whole days rounded up, at least one.
pub fn nights_between(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    let secs = (check_out - check_in).num_seconds();
    let nights = secs / SECONDS_PER_DAY + i64::from(secs % SECONDS_PER_DAY > 0);
    nights.max(1)
}

pub fn total_price(price_per_night: f64, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> f64 {
    price_per_night * nights_between(check_in, check_out) as f64
}

/// One async mutex per room so check-then-insert cannot interleave.
/// Entries live only while some request holds a lease on the room.
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomLocks {
    fn lease(&self, room_id: &str) -> RoomLease<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(room_id.to_string()).or_default().clone();
        RoomLease {
            locks: self,
            room_id: room_id.to_string(),
            lock: Some(lock),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A claim on one room's mutex. The last lease for a room removes its entry.
struct RoomLease<'a> {
    locks: &'a RoomLocks,
    room_id: String,
    lock: Option<Arc<tokio::sync::Mutex<()>>>,
}

impl RoomLease<'_> {
    async fn acquire(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

impl Drop for RoomLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only made and released under the map lock.
        drop(self.lock.take());
        if locks.get(&self.room_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&self.room_id);
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub room_id: String,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub guests: u32,
    /// Where to send the confirmation; falls back to the user's email.
    pub recipient_email: Option<String>,
}

impl NewBooking {
    pub fn validate(&self) -> AppResult<()> {
        if self.room_id.trim().is_empty() {
            return Err(AppError::validation("Room is required"));
        }
        if self.guests == 0 {
            return Err(AppError::validation("At least one guest is required"));
        }
        if self.check_out < self.check_in {
            return Err(AppError::validation("Check-out date must be after check-in date"));
        }
        Ok(())
    }
}

/// Owner view over all bookings of their hotel, newest first.
#[derive(Debug, Clone)]
pub struct HotelBookings {
    pub total_bookings: usize,
    /// Gross booked value, paid or not.
    pub total_revenue: f64,
    pub bookings: Vec<BookingDetails>,
}

pub struct BookingService {
    db: Arc<Database>,
    mailer: Option<Arc<dyn Mailer>>,
    currency: String,
    room_locks: RoomLocks,
}

impl BookingService {
    pub fn new(db: Arc<Database>, mailer: Option<Arc<dyn Mailer>>, currency: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            currency: currency.into(),
            room_locks: RoomLocks::default(),
        }
    }

    async fn storage(&self) -> AppResult<&Storage> {
        Ok(self.db.storage().await?)
    }

    pub async fn check_availability(
        &self,
        room_id: &str,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    ) -> AppResult<bool> {
        let storage = self.storage().await?;
        Ok(availability::is_available(storage, room_id, check_in, check_out)?)
    }

    pub async fn create_booking(&self, request: NewBooking) -> AppResult<Booking> {
        request.validate()?;
        let storage = self.storage().await?;

        let room = storage
            .get_room(&request.room_id)?
            .ok_or_else(AppError::room_not_found)?;
        let hotel = storage.get_hotel(&room.hotel)?;

        let booking = {
            let lease = self.room_locks.lease(&room.id);
            let _guard = lease.acquire().await;

            if !availability::is_available(storage, &room.id, request.check_in, request.check_out)? {
                debug!(room = %room.id, "room unavailable for requested dates");
                return Err(AppError::room_unavailable());
            }

            let booking = Booking {
                id: Uuid::new_v4().to_string(),
                user_id: request.user_id.clone(),
                room_id: room.id.clone(),
                hotel_id: room.hotel.clone(),
                guests: request.guests,
                check_in_date: request.check_in,
                check_out_date: request.check_out,
                total_price: total_price(room.price_per_night, request.check_in, request.check_out),
                is_paid: false,
                payment_method: None,
                created_at: Utc::now(),
            };
            storage.put_booking(&booking)?;
            booking
        };

        info!(
            booking = %booking.id,
            room = %booking.room_id,
            user = %booking.user_id,
            total = booking.total_price,
            "booking created"
        );

        if let (Some(mailer), Some(hotel)) = (&self.mailer, &hotel) {
            let recipient = match request.recipient_email.as_deref() {
                Some(email) => Some(email.to_string()),
                None => match storage.get_user(&request.user_id) {
                    Ok(user) => user.and_then(|u| u.deliverable_email().map(str::to_string)),
                    Err(e) => {
                        warn!(booking = %booking.id, error = %e, "could not load guest for confirmation mail");
                        None
                    }
                },
            };
            match recipient.filter(|e| is_deliverable_email(e)) {
                Some(to) => {
                    let mail = mailer::booking_confirmation(&to, &booking, &room, hotel, &self.currency);
                    mailer::dispatch(mailer.clone(), mail);
                }
                None => debug!(booking = %booking.id, "no deliverable address, skipping confirmation"),
            }
        }

        Ok(booking)
    }

    pub async fn list_user_bookings(&self, user_id: &str) -> AppResult<Vec<BookingDetails>> {
        let storage = self.storage().await?;
        let mut bookings = storage.bookings_where(|b| b.user_id == user_id)?;
        sort_newest_first(&mut bookings);

        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let room = storage.get_room(&booking.room_id)?;
            let hotel = storage.get_hotel(&booking.hotel_id)?;
            details.push(BookingDetails::join(booking, room, hotel, None));
        }
        Ok(details)
    }

    /// `None` when the owner has not registered a hotel.
    pub async fn list_hotel_bookings(&self, owner_id: &str) -> AppResult<Option<HotelBookings>> {
        let storage = self.storage().await?;
        let Some(hotel) = storage.hotel_for_owner(owner_id)? else {
            return Ok(None);
        };

        let mut bookings = storage.bookings_where(|b| b.hotel_id == hotel.id)?;
        sort_newest_first(&mut bookings);

        let total_revenue = bookings.iter().map(|b| b.total_price).sum();
        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let room = storage.get_room(&booking.room_id)?;
            let guest = storage.get_user(&booking.user_id)?;
            details.push(BookingDetails::join(booking, room, Some(hotel.clone()), guest));
        }

        Ok(Some(HotelBookings {
            total_bookings: details.len(),
            total_revenue,
            bookings: details,
        }))
    }
}

fn sort_newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
