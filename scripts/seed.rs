//! Seed script for Hoteluxe
//!
//! Upserts the demo hotel for `SEED_OWNER_ID` and replaces its rooms with
//! four demo rooms. Prints a development session token when
//! `CLERK_SECRET_KEY` is set.
//! Run: cargo run --bin seed

use anyhow::Context;
use chrono::{Duration, Utc};
use uuid::Uuid;

use hoteluxe::auth::SessionKeys;
use hoteluxe::config::Config;
use hoteluxe::models::{AuthPayload, Hotel, Role, Room, User};
use hoteluxe::storage::Database;

struct DemoRoom {
    room_type: &'static str,
    price_per_night: f64,
    amenities: [&'static str; 3],
    photos: [usize; 4],
}

const PHOTOS: [&str; 4] = [
    "https://images.unsplash.com/photo-1631049307264-da0ec9d70304?w=800",
    "https://images.unsplash.com/photo-1618773928121-c32242e63f39?w=800",
    "https://images.unsplash.com/photo-1590490360182-c33d57733427?w=800",
    "https://images.unsplash.com/photo-1566665797739-1674de7a421a?w=800",
];

const DEMO_ROOMS: [DemoRoom; 4] = [
    DemoRoom {
        room_type: "Double Bed",
        price_per_night: 399.0,
        amenities: ["roomService", "mountainView", "poolAccess"],
        photos: [0, 1, 2, 3],
    },
    DemoRoom {
        room_type: "Double Bed",
        price_per_night: 299.0,
        amenities: ["roomService", "mountainView", "poolAccess"],
        photos: [1, 2, 3, 0],
    },
    DemoRoom {
        room_type: "Double Bed",
        price_per_night: 249.0,
        amenities: ["freeWifi", "freeBreakfast", "roomService"],
        photos: [2, 3, 0, 1],
    },
    DemoRoom {
        room_type: "Single Bed",
        price_per_night: 199.0,
        amenities: ["freeWifi", "roomService", "poolAccess"],
        photos: [3, 0, 1, 2],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let owner_id = config
        .seed_owner_id
        .clone()
        .context("SEED_OWNER_ID environment variable is required")?;

    let db = Database::new(config.database.clone());
    let storage = db.storage().await?;
    println!("Connected to {}", config.database.path.display());

    let mut owner = storage
        .get_user(&owner_id)?
        .unwrap_or_else(|| User::new(owner_id.clone(), "Demo Owner"));
    owner.role = Role::HotelOwner;
    storage.put_user(&owner)?;

    let now = Utc::now();
    let hotel = match storage.hotel_for_owner(&owner_id)? {
        Some(existing) => Hotel {
            name: "Urbanza Suites".to_string(),
            address: "Main Road 123 Street, 23 Colony".to_string(),
            contact: "+0123456789".to_string(),
            city: "New York".to_string(),
            ..existing
        },
        None => Hotel {
            id: Uuid::new_v4().to_string(),
            name: "Urbanza Suites".to_string(),
            address: "Main Road 123 Street, 23 Colony".to_string(),
            contact: "+0123456789".to_string(),
            city: "New York".to_string(),
            owner: owner_id.clone(),
            created_at: now,
        },
    };
    storage.put_hotel(&hotel)?;
    println!("Hotel ready: {} ({})", hotel.name, hotel.id);

    let removed = storage.delete_rooms_for_hotel(&hotel.id)?;
    println!("Deleted {removed} existing rooms");

    for (i, demo) in DEMO_ROOMS.iter().enumerate() {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            hotel: hotel.id.clone(),
            room_type: demo.room_type.to_string(),
            price_per_night: demo.price_per_night,
            amenities: demo.amenities.iter().map(|a| a.to_string()).collect(),
            images: demo.photos.iter().map(|&p| PHOTOS[p].to_string()).collect(),
            is_available: true,
            // staggered so "newest first" listings keep this order
            created_at: now - Duration::seconds(i as i64),
        };
        storage.put_room(&room)?;
        println!("  {} {} at {}/night", room.id, room.room_type, room.price_per_night);
    }

    if let Some(secret) = config.identity.secret_key.as_deref() {
        let claims = AuthPayload {
            sub: owner.id.clone(),
            exp: 0,
            email: owner.email.clone(),
            name: Some(owner.username.clone()),
            image: None,
        };
        let token = SessionKeys::new(secret).issue(claims, 7 * 24 * 60 * 60)?;
        println!("Development token for {}:\n{token}", owner.id);
    }

    storage.flush().await?;
    println!("Seed complete");
    Ok(())
}
