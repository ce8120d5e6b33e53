//! Document storage on Sled.
//!
//! Every record is a Serde JSON document in its own tree keyed by `_id`:
//! - `users`, `hotels`, `rooms`, `bookings`
//! - `hotel_owners`: owner id -> hotel id, the one-hotel-per-owner index
//!
//! [`Database`] is the process-wide handle: it opens the store lazily, once,
//! retrying with exponential backoff.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::DatabaseSettings;
use crate::models::{Booking, Hotel, Role, Room, User};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Clone)] // Sled handles are cheap to clone and thread-safe
pub struct Storage {
    db: Db,
    users: sled::Tree,
    hotels: sled::Tree,
    hotel_owners: sled::Tree,
    rooms: sled::Tree,
    bookings: sled::Tree,
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: &std::path::Path) -> StorageResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop. Used by tests.
    #[cfg(test)]
    pub(crate) fn temporary() -> StorageResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        Ok(Self {
            users: db.open_tree("users")?,
            hotels: db.open_tree("hotels")?,
            hotel_owners: db.open_tree("hotel_owners")?,
            rooms: db.open_tree("rooms")?,
            bookings: db.open_tree("bookings")?,
            db,
        })
    }

    pub async fn flush(&self) -> StorageResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    // --- users ---

    pub fn get_user(&self, id: &str) -> StorageResult<Option<User>> {
        get_doc(&self.users, id)
    }

    /// Insert or replace a user document.
    pub fn put_user(&self, user: &User) -> StorageResult<()> {
        put_doc(&self.users, &user.id, user)
    }

    /// Store a new user. Returns `false` when the id is already taken.
    pub fn insert_user(&self, user: &User) -> StorageResult<bool> {
        let created = self.users.compare_and_swap(
            user.id.as_bytes(),
            None as Option<&[u8]>,
            Some(serde_json::to_vec(user)?),
        )?;
        Ok(created.is_ok())
    }

    /// Read-modify-write of a stored user. `change` returns whether it touched
    /// the record and is re-run on the latest copy when another writer got in
    /// first. Returns `None` when there is no such user.
    pub fn update_user<F>(&self, id: &str, mut change: F) -> StorageResult<Option<User>>
    where
        F: FnMut(&mut User) -> bool,
    {
        loop {
            let Some(current) = self.users.get(id.as_bytes())? else {
                return Ok(None);
            };
            let mut user: User = serde_json::from_slice(&current)?;
            if !change(&mut user) {
                return Ok(Some(user));
            }
            let swapped = self
                .users
                .compare_and_swap(id.as_bytes(), Some(&current), Some(serde_json::to_vec(&user)?))?;
            if swapped.is_ok() {
                return Ok(Some(user));
            }
        }
    }

    // --- hotels ---

    /// Store a hotel for its owner without touching the user. Returns `false`
    /// without writing anything when the owner already has one.
    #[cfg(test)]
    pub(crate) fn insert_hotel(&self, hotel: &Hotel) -> StorageResult<bool> {
        self.claim_hotel(hotel, None)
    }

    /// Store the owner's hotel and give them the `hotelOwner` role in one
    /// transaction. `owner` is written as given when no user document exists.
    pub fn register_hotel(&self, hotel: &Hotel, owner: &User) -> StorageResult<bool> {
        self.claim_hotel(hotel, Some(owner))
    }

    fn claim_hotel(&self, hotel: &Hotel, promote: Option<&User>) -> StorageResult<bool> {
        let hotel_doc = serde_json::to_vec(hotel)?;
        (&self.hotel_owners, &self.hotels, &self.users)
            .transaction(|(owners, hotels, users)| -> ConflictableTransactionResult<bool, StorageError> {
                if owners.get(hotel.owner.as_bytes())?.is_some() {
                    return Ok(false);
                }
                owners.insert(hotel.owner.as_bytes(), hotel.id.as_bytes())?;
                hotels.insert(hotel.id.as_bytes(), hotel_doc.clone())?;

                if let Some(owner) = promote {
                    let mut user: User = match users.get(owner.id.as_bytes())? {
                        Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_codec)?,
                        None => owner.clone(),
                    };
                    user.role = Role::HotelOwner;
                    users.insert(owner.id.as_bytes(), serde_json::to_vec(&user).map_err(abort_codec)?)?;
                }
                Ok(true)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StorageError::Sled(e),
            })
    }

    /// Overwrite an existing hotel's fields, keeping the owner index intact.
    pub fn put_hotel(&self, hotel: &Hotel) -> StorageResult<()> {
        self.hotel_owners.insert(hotel.owner.as_bytes(), hotel.id.as_bytes())?;
        put_doc(&self.hotels, &hotel.id, hotel)
    }

    pub fn get_hotel(&self, id: &str) -> StorageResult<Option<Hotel>> {
        get_doc(&self.hotels, id)
    }

    pub fn hotel_for_owner(&self, owner_id: &str) -> StorageResult<Option<Hotel>> {
        match self.hotel_owners.get(owner_id.as_bytes())? {
            Some(hotel_id) => {
                let hotel_id = String::from_utf8_lossy(&hotel_id).into_owned();
                self.get_hotel(&hotel_id)
            }
            None => Ok(None),
        }
    }

    // --- rooms ---

    pub fn put_room(&self, room: &Room) -> StorageResult<()> {
        put_doc(&self.rooms, &room.id, room)
    }

    pub fn get_room(&self, id: &str) -> StorageResult<Option<Room>> {
        get_doc(&self.rooms, id)
    }

    pub fn rooms_where<F>(&self, keep: F) -> StorageResult<Vec<Room>>
    where
        F: Fn(&Room) -> bool,
    {
        scan_docs(&self.rooms, keep)
    }

    pub fn rooms_for_hotel(&self, hotel_id: &str) -> StorageResult<Vec<Room>> {
        self.rooms_where(|r| r.hotel == hotel_id)
    }

    /// Remove every room of a hotel. Returns how many were removed.
    pub fn delete_rooms_for_hotel(&self, hotel_id: &str) -> StorageResult<usize> {
        let rooms = self.rooms_for_hotel(hotel_id)?;
        for room in &rooms {
            self.rooms.remove(room.id.as_bytes())?;
        }
        Ok(rooms.len())
    }

    // --- bookings ---

    pub fn put_booking(&self, booking: &Booking) -> StorageResult<()> {
        put_doc(&self.bookings, &booking.id, booking)
    }

    pub fn get_booking(&self, id: &str) -> StorageResult<Option<Booking>> {
        get_doc(&self.bookings, id)
    }

    pub fn bookings_where<F>(&self, keep: F) -> StorageResult<Vec<Booking>>
    where
        F: Fn(&Booking) -> bool,
    {
        scan_docs(&self.bookings, keep)
    }
}

fn abort_codec(e: serde_json::Error) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(StorageError::Codec(e))
}

fn put_doc<T: Serialize>(tree: &sled::Tree, id: &str, doc: &T) -> StorageResult<()> {
    let json_bytes = serde_json::to_vec(doc)?;
    tree.insert(id.as_bytes(), json_bytes)?;
    Ok(())
}

fn get_doc<T: DeserializeOwned>(tree: &sled::Tree, id: &str) -> StorageResult<Option<T>> {
    match tree.get(id.as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan_docs<T, F>(tree: &sled::Tree, keep: F) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    let mut docs = vec![];
    for item in tree.iter() {
        let (_, value) = item?;
        let doc: T = serde_json::from_slice(&value)?;
        if keep(&doc) {
            docs.push(doc);
        }
    }
    Ok(docs)
}

/// Shared, lazily opened handle to the document store.
///
/// Concurrent first callers all await the same open attempt. A failed open
/// leaves the handle empty so the next call tries again.
pub struct Database {
    settings: DatabaseSettings,
    storage: OnceCell<Storage>,
}

impl Database {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            storage: OnceCell::new(),
        }
    }

    /// Wrap an already opened store.
    pub fn with_storage(settings: DatabaseSettings, storage: Storage) -> Self {
        Self {
            settings,
            storage: OnceCell::new_with(Some(storage)),
        }
    }

    pub async fn storage(&self) -> StorageResult<&Storage> {
        self.storage
            .get_or_try_init(|| connect_with_retry(&self.settings))
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.storage.initialized()
    }
}

async fn connect_with_retry(settings: &DatabaseSettings) -> StorageResult<Storage> {
    let attempts = settings.connect_attempts.max(1);
    let mut delay = settings.retry_base_delay;

    for attempt in 1..=attempts {
        let path = settings.path.clone();
        let opened = tokio::task::spawn_blocking(move || Storage::open(&path))
            .await
            .map_err(|e| StorageError::Unavailable(format!("open task failed: {e}")))
            .and_then(|res| res);

        match opened {
            Ok(storage) => {
                info!(path = %settings.path.display(), attempt, "document store opened");
                return Ok(storage);
            }
            Err(e) if attempt == attempts => {
                return Err(StorageError::Unavailable(format!(
                    "failed to open {} after {attempts} attempts: {e}",
                    settings.path.display()
                )));
            }
            Err(e) => {
                warn!(attempt, error = %e, retry_in_ms = delay.as_millis() as u64, "document store open failed");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
    }

    Err(StorageError::Unavailable("no connection attempts configured".to_string()))
}
