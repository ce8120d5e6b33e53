//! User records: identity-provider sync, lazy creation and search history.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{placeholder_email, AuthPayload, User};
use crate::storage::{Storage, StorageResult};

#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: IdentityUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

impl IdentityUser {
    fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            "Guest".to_string()
        } else {
            name
        }
    }

    fn email(&self) -> String {
        self.email_addresses
            .first()
            .map(|e| e.email_address.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| placeholder_email(&self.id))
    }

    /// Copy the provider-owned profile fields. Role and search history stay ours.
    fn apply_profile(&self, user: &mut User) -> bool {
        user.username = self.display_name();
        user.email = Some(self.email());
        user.image = self.image_url.clone().unwrap_or_default();
        true
    }
}

#[derive(Debug, PartialEq)]
pub enum IdentityOutcome {
    Upserted(User),
    Ignored,
}

/// Apply a verified identity-provider event. Users are never deleted here.
pub fn apply_identity_event(storage: &Storage, event: &IdentityEvent) -> StorageResult<IdentityOutcome> {
    match event.kind.as_str() {
        "user.created" | "user.updated" => {
            let data = &event.data;
            let user = loop {
                if let Some(user) = storage.update_user(&data.id, |user| data.apply_profile(user))? {
                    break user;
                }
                let mut user = User::new(data.id.clone(), String::new());
                data.apply_profile(&mut user);
                if storage.insert_user(&user)? {
                    break user;
                }
            };
            info!(user = %user.id, kind = %event.kind, "user synced from identity provider");
            Ok(IdentityOutcome::Upserted(user))
        }
        "user.deleted" => {
            warn!(user = %event.data.id, "identity provider deleted user; local record kept");
            Ok(IdentityOutcome::Ignored)
        }
        other => {
            info!(kind = %other, "ignoring identity event");
            Ok(IdentityOutcome::Ignored)
        }
    }
}

/// Load the user behind a session, creating the record on first sight.
pub fn resolve_session_user(storage: &Storage, claims: &AuthPayload) -> StorageResult<User> {
    loop {
        if let Some(user) = storage.get_user(&claims.sub)? {
            return Ok(user);
        }
        let user = session_user(claims);
        if storage.insert_user(&user)? {
            info!(user = %user.id, "user created from session");
            return Ok(user);
        }
    }
}

fn session_user(claims: &AuthPayload) -> User {
    let mut user = User::new(
        claims.sub.clone(),
        claims.name.clone().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "Guest".to_string()),
    );
    user.email = Some(
        claims
            .email
            .clone()
            .unwrap_or_else(|| placeholder_email(&claims.sub)),
    );
    user.image = claims.image.clone().unwrap_or_default();
    user
}

/// Record a searched city on the stored user and refresh `user` with the
/// result. Only the search history of the stored document changes.
pub fn store_recent_search(storage: &Storage, user: &mut User, city: &str) -> AppResult<()> {
    let city = city.trim();
    if city.is_empty() {
        return Err(AppError::validation("City is required"));
    }
    match storage.update_user(&user.id, |stored| stored.push_recent_city(city))? {
        Some(stored) => *user = stored,
        None => {
            user.push_recent_city(city);
            if !storage.insert_user(user)? {
                return store_recent_search(storage, user, city);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serde_json::json;

    fn event(kind: &str, data: serde_json::Value) -> IdentityEvent {
        serde_json::from_value(json!({ "type": kind, "data": data })).unwrap()
    }

    #[test]
    fn created_event_stores_profile() {
        let storage = Storage::temporary().unwrap();
        let evt = event(
            "user.created",
            json!({
                "id": "user_1",
                "email_addresses": [{"email_address": "ada@example.com"}],
                "first_name": "Ada",
                "last_name": "Lovelace",
                "image_url": "https://img.test/ada.png"
            }),
        );
        apply_identity_event(&storage, &evt).unwrap();

        let user = storage.get_user("user_1").unwrap().unwrap();
        assert_eq!(user.username, "Ada Lovelace");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.image, "https://img.test/ada.png");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn update_keeps_role_and_history_and_synthesizes_missing_email() {
        let storage = Storage::temporary().unwrap();
        let mut existing = User::new("user_1", "Old Name");
        existing.role = Role::HotelOwner;
        existing.recent_searched_cities = vec!["Paris".into()];
        storage.put_user(&existing).unwrap();

        apply_identity_event(&storage, &event("user.updated", json!({"id": "user_1", "first_name": "New"}))).unwrap();

        let user = storage.get_user("user_1").unwrap().unwrap();
        assert_eq!(user.username, "New");
        assert_eq!(user.role, Role::HotelOwner);
        assert_eq!(user.recent_searched_cities, vec!["Paris"]);
        assert_eq!(user.email, Some(placeholder_email("user_1")));
        assert_eq!(user.deliverable_email(), None);
    }

    #[test]
    fn deleted_event_keeps_user() {
        let storage = Storage::temporary().unwrap();
        storage.put_user(&User::new("user_1", "Ada")).unwrap();
        let outcome = apply_identity_event(&storage, &event("user.deleted", json!({"id": "user_1"}))).unwrap();
        assert_eq!(outcome, IdentityOutcome::Ignored);
        assert!(storage.get_user("user_1").unwrap().is_some());
    }

    #[test]
    fn session_user_is_created_once() {
        let storage = Storage::temporary().unwrap();
        let claims = AuthPayload {
            sub: "user_9".into(),
            exp: 0,
            email: None,
            name: None,
            image: None,
        };
        let created = resolve_session_user(&storage, &claims).unwrap();
        assert_eq!(created.username, "Guest");
        assert_eq!(created.email, Some(placeholder_email("user_9")));

        let mut changed = created.clone();
        changed.push_recent_city("Oslo");
        storage.put_user(&changed).unwrap();
        assert_eq!(resolve_session_user(&storage, &claims).unwrap(), changed);
    }

    #[test]
    fn recent_search_is_persisted_and_capped() {
        let storage = Storage::temporary().unwrap();
        let mut user = User::new("user_1", "Ada");
        storage.put_user(&user).unwrap();
        for city in ["Paris", "Rome", "Oslo", "Lima", "Rome"] {
            store_recent_search(&storage, &mut user, city).unwrap();
        }
        let stored = storage.get_user("user_1").unwrap().unwrap();
        assert_eq!(stored.recent_searched_cities, vec!["Rome", "Oslo", "Lima"]);

        assert!(matches!(
            store_recent_search(&storage, &mut user, "  "),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn recent_search_from_stale_session_keeps_owner_role() {
        let storage = Storage::temporary().unwrap();
        let mut session = User::new("user_1", "Ada");
        storage.put_user(&session).unwrap();

        // The owner registers a hotel after this session snapshot was loaded.
        crate::hotels::register_hotel(
            &storage,
            &session,
            crate::hotels::NewHotel {
                name: "Urbanza Suites".into(),
                address: "Main Road 123".into(),
                contact: "+0123456789".into(),
                city: "New York".into(),
            },
        )
        .unwrap();
        assert_eq!(session.role, Role::User);

        store_recent_search(&storage, &mut session, "Paris").unwrap();

        let stored = storage.get_user("user_1").unwrap().unwrap();
        assert_eq!(stored.role, Role::HotelOwner);
        assert_eq!(stored.recent_searched_cities, vec!["Paris"]);
        assert_eq!(session, stored);
    }

    #[test]
    fn identity_update_keeps_concurrent_search_history() {
        let storage = Storage::temporary().unwrap();
        let mut session = User::new("user_1", "Ada");
        storage.put_user(&session).unwrap();
        store_recent_search(&storage, &mut session, "Lima").unwrap();

        apply_identity_event(&storage, &event("user.updated", json!({"id": "user_1", "first_name": "Grace"}))).unwrap();
        store_recent_search(&storage, &mut session, "Oslo").unwrap();

        let stored = storage.get_user("user_1").unwrap().unwrap();
        assert_eq!(stored.username, "Grace");
        assert_eq!(stored.recent_searched_cities, vec!["Lima", "Oslo"]);
    }
}
