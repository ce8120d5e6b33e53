use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Mailbox domain used when the identity provider does not hand us an email.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "placeholder.invalid";

/// How many recent city searches a user keeps.
pub const RECENT_CITIES_LIMIT: usize = 3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    #[default]
    User,
    HotelOwner,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub recent_searched_cities: Vec<String>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            image: String::new(),
            role: Role::User,
            recent_searched_cities: Vec::new(),
        }
    }

    /// Record a searched city. Known cities keep their slot; a new one is
    /// appended and the oldest dropped past [`RECENT_CITIES_LIMIT`].
    /// Returns whether the list changed.
    pub fn push_recent_city(&mut self, city: &str) -> bool {
        if self.recent_searched_cities.iter().any(|c| c == city) {
            return false;
        }
        if self.recent_searched_cities.len() >= RECENT_CITIES_LIMIT {
            let overflow = self.recent_searched_cities.len() + 1 - RECENT_CITIES_LIMIT;
            self.recent_searched_cities.drain(..overflow);
        }
        self.recent_searched_cities.push(city.to_string());
        true
    }

    /// The stored email, unless it is missing or synthesized.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| is_deliverable_email(e))
    }
}

/// Address used for users whose provider record has no email.
pub fn placeholder_email(user_id: &str) -> String {
    format!("{user_id}@{PLACEHOLDER_EMAIL_DOMAIN}")
}

pub fn is_deliverable_email(email: &str) -> bool {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.eq_ignore_ascii_case(PLACEHOLDER_EMAIL_DOMAIN)
        }
        None => false,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub contact: String,
    pub city: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: String,
    pub hotel: String,
    pub room_type: String,
    pub price_per_night: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

fn available_by_default() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    #[serde(rename = "room")]
    pub room_id: String,
    #[serde(rename = "hotel")]
    pub hotel_id: String,
    pub guests: u32,
    pub check_in_date: DateTime<Utc>,
    pub check_out_date: DateTime<Utc>,
    pub total_price: f64,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Inclusive overlap: stays sharing a boundary day collide.
    pub fn overlaps(&self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> bool {
        self.check_in_date <= check_out && self.check_out_date >= check_in
    }
}

/// A booking joined with the documents it references, as listed to clients.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest: Option<User>,
    pub room: Option<Room>,
    pub hotel: Option<Hotel>,
    pub guests: u32,
    pub check_in_date: DateTime<Utc>,
    pub check_out_date: DateTime<Utc>,
    pub total_price: f64,
    pub is_paid: bool,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingDetails {
    pub fn join(booking: Booking, room: Option<Room>, hotel: Option<Hotel>, guest: Option<User>) -> Self {
        Self {
            id: booking.id,
            user: booking.user_id,
            guest,
            room,
            hotel,
            guests: booking.guests,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            total_price: booking.total_price,
            is_paid: booking.is_paid,
            payment_method: booking.payment_method,
            created_at: booking.created_at,
        }
    }
}

/// Session token claims issued for the identity provider's users.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthPayload {
    pub sub: String, // user id
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_stay_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Serde adapter for request bodies carrying stay dates.
pub fn deserialize_stay_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_stay_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date {raw:?}, expected YYYY-MM-DD or RFC 3339")))
}
