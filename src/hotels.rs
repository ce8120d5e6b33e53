//! Hotel registration and room management for owners.

use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::media::{ImageUpload, MediaHost};
use crate::models::{Hotel, Room, User};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct NewHotel {
    pub name: String,
    pub address: String,
    pub contact: String,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_type: String,
    pub price_per_night: f64,
    pub amenities: Vec<String>,
    pub images: Vec<ImageUpload>,
}

/// Hotel as shown next to a room, with the owner's avatar.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HotelSummary {
    #[serde(flatten)]
    pub hotel: Hotel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_image: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    #[serde(rename = "_id")]
    pub id: String,
    pub hotel: Option<HotelSummary>,
    pub room_type: String,
    pub price_per_night: f64,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub is_available: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl RoomDetails {
    fn join(room: Room, hotel: Option<HotelSummary>) -> Self {
        Self {
            id: room.id,
            hotel,
            room_type: room.room_type,
            price_per_night: room.price_per_night,
            amenities: room.amenities,
            images: room.images,
            is_available: room.is_available,
            created_at: room.created_at,
        }
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Register the caller's single hotel and promote them to owner.
pub fn register_hotel(storage: &Storage, owner: &User, request: NewHotel) -> AppResult<Hotel> {
    let hotel = Hotel {
        id: Uuid::new_v4().to_string(),
        name: required(&request.name, "Name")?,
        address: required(&request.address, "Address")?,
        contact: required(&request.contact, "Contact")?,
        city: required(&request.city, "City")?,
        owner: owner.id.clone(),
        created_at: Utc::now(),
    };
    if !storage.register_hotel(&hotel, owner)? {
        return Err(AppError::Conflict("Hotel has already been registered!".to_string()));
    }

    info!(hotel = %hotel.id, owner = %owner.id, "hotel registered");
    Ok(hotel)
}

fn owned_hotel(storage: &Storage, owner_id: &str) -> AppResult<Hotel> {
    storage
        .hotel_for_owner(owner_id)?
        .ok_or_else(|| AppError::not_found("No Hotel found"))
}

/// Create a room in the owner's hotel, uploading its images first.
pub async fn create_room(
    storage: &Storage,
    media: Option<&dyn MediaHost>,
    owner_id: &str,
    request: NewRoom,
) -> AppResult<Room> {
    let room_type = required(&request.room_type, "Room type")?;
    if !request.price_per_night.is_finite() || request.price_per_night <= 0.0 {
        return Err(AppError::validation("Price per night must be a positive number"));
    }
    let hotel = owned_hotel(storage, owner_id)?;

    let images = if request.images.is_empty() {
        vec![]
    } else {
        let media = media.ok_or_else(|| AppError::upstream("Image uploads are not configured"))?;
        try_join_all(request.images.into_iter().map(|image| media.upload(image)))
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?
    };

    let room = Room {
        id: Uuid::new_v4().to_string(),
        hotel: hotel.id,
        room_type,
        price_per_night: request.price_per_night,
        amenities: request.amenities,
        images,
        is_available: true,
        created_at: Utc::now(),
    };
    storage.put_room(&room)?;
    info!(room = %room.id, hotel = %room.hotel, "room created");
    Ok(room)
}

fn newest_first(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Every bookable room, newest first, with hotel and owner avatar.
pub fn list_available_rooms(storage: &Storage) -> AppResult<Vec<RoomDetails>> {
    let mut rooms = storage.rooms_where(|r| r.is_available)?;
    newest_first(&mut rooms);

    let mut listed = Vec::with_capacity(rooms.len());
    for room in rooms {
        let hotel = match storage.get_hotel(&room.hotel)? {
            Some(hotel) => {
                let owner_image = storage.get_user(&hotel.owner)?.map(|u| u.image);
                Some(HotelSummary { hotel, owner_image })
            }
            None => None,
        };
        listed.push(RoomDetails::join(room, hotel));
    }
    Ok(listed)
}

pub fn list_owner_rooms(storage: &Storage, owner_id: &str) -> AppResult<Vec<RoomDetails>> {
    let hotel = owned_hotel(storage, owner_id)?;
    let mut rooms = storage.rooms_for_hotel(&hotel.id)?;
    newest_first(&mut rooms);
    Ok(rooms
        .into_iter()
        .map(|room| {
            let summary = HotelSummary {
                hotel: hotel.clone(),
                owner_image: None,
            };
            RoomDetails::join(room, Some(summary))
        })
        .collect())
}

/// Flip a room's availability. Only rooms of the owner's hotel qualify.
pub fn toggle_room_availability(storage: &Storage, owner_id: &str, room_id: &str) -> AppResult<Room> {
    let hotel = owned_hotel(storage, owner_id)?;
    let mut room = storage
        .get_room(room_id)?
        .filter(|r| r.hotel == hotel.id)
        .ok_or_else(AppError::room_not_found)?;
    room.is_available = !room.is_available;
    storage.put_room(&room)?;
    info!(room = %room.id, available = room.is_available, "room availability toggled");
    Ok(room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_support::FakeMediaHost;
    use crate::models::Role;
    use crate::storage::test_support::{hotel, room};
    use std::sync::atomic::Ordering;

    fn new_hotel(name: &str) -> NewHotel {
        NewHotel {
            name: name.to_string(),
            address: "Main Road 123".to_string(),
            contact: "+0123456789".to_string(),
            city: "New York".to_string(),
        }
    }

    fn image(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn registration_promotes_user_once() {
        let storage = Storage::temporary().unwrap();
        let user = User::new("owner", "Olive");
        storage.put_user(&user).unwrap();

        let first = register_hotel(&storage, &user, new_hotel("Urbanza Suites")).unwrap();
        assert_eq!(storage.get_user("owner").unwrap().unwrap().role, Role::HotelOwner);

        let err = register_hotel(&storage, &user, new_hotel("Second")).unwrap_err();
        assert_eq!(err.to_string(), "Hotel has already been registered!");
        assert_eq!(storage.hotel_for_owner("owner").unwrap(), Some(first));
    }

    #[test]
    fn rejected_registration_leaves_user_untouched() {
        let storage = Storage::temporary().unwrap();
        let user = User::new("owner", "Olive");
        storage.put_user(&user).unwrap();
        register_hotel(&storage, &user, new_hotel("Urbanza Suites")).unwrap();

        let mut searched = storage.get_user("owner").unwrap().unwrap();
        searched.push_recent_city("Lisbon");
        storage.put_user(&searched).unwrap();

        assert!(register_hotel(&storage, &user, new_hotel("Second")).is_err());
        assert_eq!(storage.get_user("owner").unwrap(), Some(searched));
    }

    #[test]
    fn registration_validates_fields() {
        let storage = Storage::temporary().unwrap();
        let mut request = new_hotel("X");
        request.city = " ".to_string();
        let err = register_hotel(&storage, &User::new("owner", "Olive"), request).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(storage.hotel_for_owner("owner").unwrap().is_none());
    }

    #[tokio::test]
    async fn room_creation_uploads_images() {
        let storage = Storage::temporary().unwrap();
        storage.insert_hotel(&hotel("h1", "owner")).unwrap();
        let fake = FakeMediaHost::default();
        let media: Option<&dyn MediaHost> = Some(&fake);

        let room = create_room(
            &storage,
            media,
            "owner",
            NewRoom {
                room_type: "Single Bed".to_string(),
                price_per_night: 199.0,
                amenities: vec!["freeWifi".to_string()],
                images: vec![image("a.png"), image("b.png")],
            },
        )
        .await
        .unwrap();

        assert_eq!(room.hotel, "h1");
        assert_eq!(room.images, vec!["https://media.test/a.png", "https://media.test/b.png"]);
        assert!(room.is_available);
        assert_eq!(fake.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(storage.get_room(&room.id).unwrap(), Some(room));
    }

    #[tokio::test]
    async fn room_creation_failures_store_nothing() {
        let storage = Storage::temporary().unwrap();
        let fake = FakeMediaHost::default();
        let media: Option<&dyn MediaHost> = Some(&fake);
        let request = |price: f64, images: Vec<ImageUpload>| NewRoom {
            room_type: "Suite".to_string(),
            price_per_night: price,
            amenities: vec![],
            images,
        };

        let err = create_room(&storage, media, "owner", request(100.0, vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), "No Hotel found");

        storage.insert_hotel(&hotel("h1", "owner")).unwrap();
        let err = create_room(&storage, media, "owner", request(0.0, vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_room(&storage, media, "owner", request(100.0, vec![image("broken.png")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let err = create_room(&storage, None, "owner", request(100.0, vec![image("a.png")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        assert!(storage.rooms_for_hotel("h1").unwrap().is_empty());
    }

    #[test]
    fn public_listing_hides_unavailable_rooms() {
        let storage = Storage::temporary().unwrap();
        storage.insert_hotel(&hotel("h1", "owner")).unwrap();
        let mut owner = User::new("owner", "Olive");
        owner.image = "https://img.test/olive.png".to_string();
        storage.put_user(&owner).unwrap();
        storage.put_room(&room("r1", "h1", 100.0)).unwrap();
        let mut closed = room("r2", "h1", 100.0);
        closed.is_available = false;
        storage.put_room(&closed).unwrap();

        let listed = list_available_rooms(&storage).unwrap();
        assert_eq!(listed.len(), 1);
        let hotel = listed[0].hotel.as_ref().unwrap();
        assert_eq!(hotel.owner_image.as_deref(), Some("https://img.test/olive.png"));

        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["hotel"]["name"], "Hotel h1");
        assert_eq!(json["hotel"]["ownerImage"], "https://img.test/olive.png");

        assert_eq!(list_owner_rooms(&storage, "owner").unwrap().len(), 2);
    }

    #[test]
    fn toggle_flips_only_own_rooms() {
        let storage = Storage::temporary().unwrap();
        storage.insert_hotel(&hotel("h1", "owner")).unwrap();
        storage.insert_hotel(&hotel("h2", "rival")).unwrap();
        storage.put_room(&room("r1", "h1", 100.0)).unwrap();

        assert!(!toggle_room_availability(&storage, "owner", "r1").unwrap().is_available);
        assert!(toggle_room_availability(&storage, "owner", "r1").unwrap().is_available);

        let err = toggle_room_availability(&storage, "rival", "r1").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(storage.get_room("r1").unwrap().unwrap().is_available);
    }
}
