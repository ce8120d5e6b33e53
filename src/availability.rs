//! Room availability over stored bookings.

use chrono::{DateTime, Utc};

use crate::storage::{Storage, StorageResult};

/// True when no booking of `room_id` overlaps `[check_in, check_out]`.
///
/// The test is inclusive on both ends, so a stay checking in on the day
/// another checks out counts as a clash.
pub fn is_available(
    storage: &Storage,
    room_id: &str,
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
) -> StorageResult<bool> {
    let clashes = storage.bookings_where(|b| b.room_id == room_id && b.overlaps(check_in, check_out))?;
    Ok(clashes.is_empty())
}
