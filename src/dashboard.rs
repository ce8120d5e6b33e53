//! Owner dashboard: totals plus the latest bookings.

use serde::Serialize;

use crate::booking::HotelBookings;
use crate::models::BookingDetails;

pub const RECENT_BOOKINGS_LIMIT: usize = 10;

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub total_bookings: usize,
    pub total_revenue: f64,
    pub recent_bookings: Vec<BookingDetails>,
}

/// Shape an owner's bookings (already newest first) for display.
pub fn summarize(listing: HotelBookings, limit: usize) -> DashboardData {
    let HotelBookings {
        total_bookings,
        total_revenue,
        mut bookings,
    } = listing;
    bookings.truncate(limit);
    DashboardData {
        total_bookings,
        total_revenue,
        recent_bookings: bookings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn details(id: usize, price: f64) -> BookingDetails {
        BookingDetails {
            id: format!("b{id}"),
            user: "u".into(),
            guest: None,
            room: None,
            hotel: None,
            guests: 1,
            check_in_date: Utc::now(),
            check_out_date: Utc::now(),
            total_price: price,
            is_paid: false,
            payment_method: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_cover_everything_but_list_is_bounded() {
        let bookings: Vec<_> = (0..15).map(|i| details(i, 10.0)).collect();
        let data = summarize(
            HotelBookings {
                total_bookings: 15,
                total_revenue: 150.0,
                bookings,
            },
            RECENT_BOOKINGS_LIMIT,
        );
        assert_eq!(data.total_bookings, 15);
        assert_eq!(data.total_revenue, 150.0);
        assert_eq!(data.recent_bookings.len(), 10);
        assert_eq!(data.recent_bookings[0].id, "b0");
    }

    #[test]
    fn empty_dashboard_serializes_zeros() {
        let data = DashboardData::default();
        assert_eq!(data.total_bookings, 0);
        assert_eq!(data.total_revenue, 0.0);
        assert!(data.recent_bookings.is_empty());

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["totalBookings"], 0);
        assert!(json["recentBookings"].as_array().unwrap().is_empty());
    }
}
