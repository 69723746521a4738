// Record store collaborator: CRUD for hotels, rooms and bookings plus the
// serializable booking commit primitive the engine relies on

use crate::domain::{Booking, BookingStatus, Hotel, Room};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("booking conflict for room {room_id}: {check_in}..{check_out} overlaps an existing stay")]
    BookingConflict {
        room_id: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn insert_hotel(&self, hotel: Hotel) -> Result<(), StoreError>;
    async fn update_hotel(&self, hotel: Hotel) -> Result<(), StoreError>;
    async fn get_hotel(&self, hotel_id: &str) -> Result<Hotel, StoreError>;
    async fn remove_hotel(&self, hotel_id: &str) -> Result<(), StoreError>;

    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;
    async fn update_room(&self, room: Room) -> Result<(), StoreError>;
    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError>;
    async fn remove_room(&self, room_id: &str) -> Result<(), StoreError>;
    async fn rooms_for_hotel(&self, hotel_id: &str) -> Result<Vec<Room>, StoreError>;

    async fn bookings_for_room(&self, room_id: &str) -> Result<Vec<Booking>, StoreError>;
    async fn get_booking(&self, booking_id: &str) -> Result<Booking, StoreError>;

    // Re-checks the overlap invariant and inserts as one atomic unit. Two
    // concurrent commits for overlapping intervals on one room must never
    // both succeed; the loser gets BookingConflict.
    async fn commit_booking(&self, booking: Booking) -> Result<(), StoreError>;

    async fn set_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<Booking, StoreError>;
}

// In-memory store backed by sharded maps. Bookings are keyed by room so the
// shard entry lock makes commit_booking's check-then-insert atomic per room.
// Write delay and failure injection mirror what an unreliable backend does.
pub struct InMemoryRecordStore {
    hotels: DashMap<String, Hotel>,
    rooms: DashMap<String, Room>,
    bookings: DashMap<String, Vec<Booking>>,
    booking_rooms: DashMap<String, String>,
    write_delay_ms: AtomicUsize,
    fail_next_writes: AtomicUsize,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            hotels: DashMap::new(),
            rooms: DashMap::new(),
            bookings: DashMap::new(),
            booking_rooms: DashMap::new(),
            write_delay_ms: AtomicUsize::new(0),
            fail_next_writes: AtomicUsize::new(0),
        }
    }

    pub fn set_write_delay_ms(&self, delay_ms: usize) {
        self.write_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    pub fn hotel_count(&self) -> usize {
        self.hotels.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    async fn apply_write_behaviour(&self) -> Result<(), StoreError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let fail_count = self.fail_next_writes.load(Ordering::SeqCst);
        if fail_count > 0 {
            self.fail_next_writes.store(fail_count - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_hotel(&self, hotel: Hotel) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        self.hotels.insert(hotel.id.clone(), hotel);
        Ok(())
    }

    async fn update_hotel(&self, hotel: Hotel) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        if !self.hotels.contains_key(&hotel.id) {
            return Err(StoreError::NotFound(format!("hotel {}", hotel.id)));
        }
        self.hotels.insert(hotel.id.clone(), hotel);
        Ok(())
    }

    async fn get_hotel(&self, hotel_id: &str) -> Result<Hotel, StoreError> {
        self.hotels
            .get(hotel_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("hotel {}", hotel_id)))
    }

    async fn remove_hotel(&self, hotel_id: &str) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        self.hotels
            .remove(hotel_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("hotel {}", hotel_id)))
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        if !self.hotels.contains_key(&room.hotel_id) {
            return Err(StoreError::NotFound(format!("hotel {}", room.hotel_id)));
        }
        self.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    async fn update_room(&self, room: Room) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        if !self.rooms.contains_key(&room.id) {
            return Err(StoreError::NotFound(format!("room {}", room.id)));
        }
        self.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("room {}", room_id)))
    }

    async fn remove_room(&self, room_id: &str) -> Result<(), StoreError> {
        self.apply_write_behaviour().await?;
        self.rooms
            .remove(room_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("room {}", room_id)))
    }

    async fn rooms_for_hotel(&self, hotel_id: &str) -> Result<Vec<Room>, StoreError> {
        Ok(self
            .rooms
            .iter()
            .filter(|entry| entry.hotel_id == hotel_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn bookings_for_room(&self, room_id: &str) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .get(room_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, StoreError> {
        let room_id = self
            .booking_rooms
            .get(booking_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        self.bookings
            .get(&room_id)
            .and_then(|entry| entry.iter().find(|b| b.id == booking_id).cloned())
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))
    }

    async fn commit_booking(&self, booking: Booking) -> Result<(), StoreError> {
        // The entry guard holds the shard lock for the whole check-then-insert,
        // which is what makes the commit serializable per room. No awaits here.
        let mut entry = self.bookings.entry(booking.room_id.clone()).or_default();

        let conflict = entry
            .iter()
            .any(|existing| existing.is_active() && existing.overlaps(booking.check_in, booking.check_out));
        if conflict {
            return Err(StoreError::BookingConflict {
                room_id: booking.room_id.clone(),
                check_in: booking.check_in,
                check_out: booking.check_out,
            });
        }

        self.booking_rooms
            .insert(booking.id.clone(), booking.room_id.clone());
        entry.push(booking);
        Ok(())
    }

    async fn set_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let room_id = self
            .booking_rooms
            .get(booking_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        let mut entry = self
            .bookings
            .get_mut(&room_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        let booking = entry
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;
        booking.status = status;
        Ok(booking.clone())
    }
}
