use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{AppState, CurrentUser, Empty, Rejection, RestResponse, RestResult};
use crate::error::AppError;
use crate::hotels::{self, NewHotel, NewRoom, RoomDetails};
use crate::media::ImageUpload;

#[derive(Deserialize)]
pub struct HotelRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub city: String,
}

pub async fn register_hotel_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<HotelRequest>, JsonRejection>,
) -> RestResult<Empty> {
    let request = state.body(payload)?;
    let storage = state.storage().await?;
    hotels::register_hotel(
        storage,
        &user,
        NewHotel {
            name: request.name,
            address: request.address,
            contact: request.contact,
            city: request.city,
        },
    )
    .map_err(|e| state.reject(e))?;
    Ok(RestResponse::message("Hotel registered successfully!"))
}

fn bad_form(state: &AppState, err: MultipartError) -> Rejection {
    state.reject(AppError::validation(err.body_text()))
}

async fn text_field(state: &AppState, field: Field<'_>) -> Result<String, Rejection> {
    field.text().await.map_err(|e| bad_form(state, e))
}

/// Read the room form: `roomType`, `pricePerNight`, `amenities` (JSON array
/// string) and any number of `images` files.
async fn read_room_form(state: &AppState, mut multipart: Multipart) -> Result<NewRoom, Rejection> {
    let mut room = NewRoom {
        room_type: String::new(),
        price_per_night: 0.0,
        amenities: vec![],
        images: vec![],
    };
    while let Some(field) = multipart.next_field().await.map_err(|e| bad_form(state, e))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "roomType" => room.room_type = text_field(state, field).await?,
            "pricePerNight" => {
                let raw = text_field(state, field).await?;
                room.price_per_night = raw.trim().parse().map_err(|_| {
                    state.reject(AppError::validation("Price per night must be a number"))
                })?;
            }
            "amenities" => {
                let raw = text_field(state, field).await?;
                if !raw.trim().is_empty() {
                    room.amenities = serde_json::from_str(&raw).map_err(|_| {
                        state.reject(AppError::validation("Amenities must be a JSON array of strings"))
                    })?;
                }
            }
            "images" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| bad_form(state, e))?;
                room.images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }
    Ok(room)
}

pub async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> RestResult<Empty> {
    let multipart = multipart.map_err(|e| state.reject(AppError::validation(e.body_text())))?;
    let request = read_room_form(&state, multipart).await?;
    let storage = state.storage().await?;
    hotels::create_room(storage, state.media.as_deref(), &owner.id, request)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(RestResponse::message("Room created successfully"))
}

#[derive(Serialize)]
pub struct RoomList {
    pub rooms: Vec<RoomDetails>,
}

pub async fn list_rooms_handler(State(state): State<Arc<AppState>>) -> RestResult<RoomList> {
    let storage = state.storage().await?;
    let rooms = hotels::list_available_rooms(storage).map_err(|e| state.reject(e))?;
    Ok(RestResponse::ok(RoomList { rooms }))
}

pub async fn owner_rooms_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> RestResult<RoomList> {
    let storage = state.storage().await?;
    let rooms = hotels::list_owner_rooms(storage, &owner.id).map_err(|e| state.reject(e))?;
    Ok(RestResponse::ok(RoomList { rooms }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub room_id: String,
}

pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> RestResult<Empty> {
    let request = state.body(payload)?;
    let storage = state.storage().await?;
    hotels::toggle_room_availability(storage, &owner.id, &request.room_id).map_err(|e| state.reject(e))?;
    Ok(RestResponse::message("Room availability updated!"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::media::test_support::FakeMediaHost;
    use crate::models::Role;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::json;
    use std::sync::Arc;

    const BOUNDARY: &str = "hoteluxe-boundary";

    fn room_form(owner: &str, images: &[&str]) -> Request<Body> {
        let files: Vec<_> = images.iter().map(|name| (*name, b"PNGDATA".to_vec())).collect();
        room_form_with(owner, &files)
    }

    fn room_form_with(owner: &str, images: &[(&str, Vec<u8>)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in [
            ("roomType", "Single Bed"),
            ("pricePerNight", "199"),
            ("amenities", r#"["Free WiFi","Room Service"]"#),
        ] {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        for (file, bytes) in images {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/rooms")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token(owner)))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn owner_registers_hotel_then_manages_rooms() {
        let mut state = state();
        Arc::get_mut(&mut state).unwrap().media = Some(Arc::new(FakeMediaHost::default()));

        let hotel = json!({"name": "Urbanza Suites", "address": "Main Road 123", "contact": "+0123456789", "city": "New York"});
        let (_, body) = send(&state, json_request("POST", "/api/hotels", Some("olive"), hotel.clone())).await;
        assert_eq!(body, json!({"success": true, "message": "Hotel registered successfully!"}));

        let (_, body) = send(&state, json_request("POST", "/api/hotels", Some("olive"), hotel)).await;
        assert_eq!(body, json!({"success": false, "message": "Hotel has already been registered!"}));

        let storage = state.db.storage().await.unwrap();
        assert_eq!(storage.get_user("olive").unwrap().unwrap().role, Role::HotelOwner);

        let (_, body) = send(&state, room_form("olive", &["front.png", "bath.png"])).await;
        assert_eq!(body, json!({"success": true, "message": "Room created successfully"}));

        let (_, body) = send(&state, get_request("/api/rooms", None)).await;
        let rooms = body["rooms"].as_array().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0]["pricePerNight"], 199.0);
        assert_eq!(rooms[0]["amenities"], json!(["Free WiFi", "Room Service"]));
        assert_eq!(rooms[0]["images"][0], "https://media.test/front.png");
        let room_id = rooms[0]["_id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &state,
            json_request("POST", "/api/rooms/toggle-availability", Some("olive"), json!({"roomId": room_id})),
        )
        .await;
        assert_eq!(body["message"], "Room availability updated!");

        let (_, body) = send(&state, get_request("/api/rooms", None)).await;
        assert!(body["rooms"].as_array().unwrap().is_empty());
        let (_, body) = send(&state, get_request("/api/rooms/owner", Some("olive"))).await;
        assert_eq!(body["rooms"][0]["isAvailable"], false);
    }

    #[tokio::test]
    async fn room_form_accepts_photos_over_default_body_limit() {
        let mut state = state();
        Arc::get_mut(&mut state).unwrap().media = Some(Arc::new(FakeMediaHost::default()));
        let hotel = json!({"name": "Urbanza Suites", "address": "Main Road 123", "contact": "+0123456789", "city": "New York"});
        send(&state, json_request("POST", "/api/hotels", Some("olive"), hotel)).await;

        let photo = vec![0x89; 3 * 1024 * 1024];
        let (_, body) = send(&state, room_form_with("olive", &[("lobby.png", photo)])).await;
        assert_eq!(body, json!({"success": true, "message": "Room created successfully"}));

        let storage = state.db.storage().await.unwrap();
        let rooms = storage.rooms_where(|_| true).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].images, vec!["https://media.test/lobby.png"]);
    }

    #[tokio::test]
    async fn failed_upload_creates_no_room() {
        let mut state = state();
        Arc::get_mut(&mut state).unwrap().media = Some(Arc::new(FakeMediaHost::default()));
        let hotel = json!({"name": "Urbanza Suites", "address": "Main Road 123", "contact": "+0123456789", "city": "New York"});
        send(&state, json_request("POST", "/api/hotels", Some("olive"), hotel)).await;

        let (_, body) = send(&state, room_form("olive", &["ok.png", "broken.png"])).await;
        assert_eq!(body["success"], false);

        let storage = state.db.storage().await.unwrap();
        assert!(storage.rooms_where(|_| true).unwrap().is_empty());
    }
}
