// Caller-facing operations: the surface the UI/API layers invoke

use crate::asset_ledger::{AssetStore, ImageAssetLedger, LedgerError};
use crate::booking::{BookingEngine, BookingError, BookingRequest, OccupancyCalendar};
use crate::domain::{Booking, Hotel, Room};
use crate::draft::{DraftError, DraftManager, HotelDraft, RoomDraft};
use crate::geo::GeoLookup;
use crate::store::{RecordStore, StoreError};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("hotel {hotel_id} still has active bookings")]
    ActiveBookings { hotel_id: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

// Detail-page view: the hotel, its rooms, and display names for the codes
#[derive(Debug, Clone)]
pub struct HotelDetails {
    pub hotel: Hotel,
    pub rooms: Vec<Room>,
    pub country_name: Option<String>,
    pub state_name: Option<String>,
}

pub struct ListingService {
    store: Arc<dyn RecordStore>,
    ledger: Arc<ImageAssetLedger>,
    drafts: DraftManager,
    engine: BookingEngine,
    geo: Arc<dyn GeoLookup>,
}

impl ListingService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        assets: Arc<dyn AssetStore>,
        geo: Arc<dyn GeoLookup>,
    ) -> Self {
        let ledger = Arc::new(ImageAssetLedger::new(assets));
        let drafts = DraftManager::new(store.clone(), ledger.clone());
        let engine = BookingEngine::new(store.clone());
        Self {
            store,
            ledger,
            drafts,
            engine,
            geo,
        }
    }

    pub fn ledger(&self) -> &ImageAssetLedger {
        &self.ledger
    }

    pub fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    pub fn engine(&self) -> &BookingEngine {
        &self.engine
    }

    pub async fn create_or_update_hotel(
        &self,
        draft: &Mutex<HotelDraft>,
    ) -> Result<String, ServiceError> {
        Ok(self.drafts.submit_hotel(draft).await?)
    }

    pub async fn create_or_update_room(
        &self,
        draft: &Mutex<RoomDraft>,
    ) -> Result<String, ServiceError> {
        Ok(self.drafts.submit_room(draft).await?)
    }

    pub async fn delete_room(&self, room_id: &str) -> Result<(), ServiceError> {
        Ok(self.drafts.delete_room(room_id).await?)
    }

    pub async fn check_availability(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, ServiceError> {
        Ok(self.engine.is_available(room_id, check_in, check_out).await?)
    }

    pub async fn occupancy_calendar(
        &self,
        room_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OccupancyCalendar, ServiceError> {
        Ok(self.engine.compute_occupancy(room_id, start, end).await?)
    }

    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, ServiceError> {
        Ok(self.engine.create_booking(request).await?)
    }

    pub async fn cancel_booking(&self, booking_id: &str) -> Result<Booking, ServiceError> {
        Ok(self.engine.cancel_booking(booking_id).await?)
    }

    pub async fn hotel_details(&self, hotel_id: &str) -> Result<HotelDetails, ServiceError> {
        let hotel = self.store.get_hotel(hotel_id).await?;
        let rooms = self.store.rooms_for_hotel(hotel_id).await?;

        let country_name = self.geo.country_name(&hotel.country);
        let state_name = hotel
            .state
            .as_deref()
            .and_then(|code| self.geo.state_name(&hotel.country, code));

        Ok(HotelDetails {
            hotel,
            rooms,
            country_name,
            state_name,
        })
    }

    // Removing a listing. Refused while any room still has a stay that is
    // confirmed and not yet checked out. Assets are released before records,
    // so a failure mid-way leaves at most dangling unused assets.
    pub async fn delete_hotel(&self, hotel_id: &str) -> Result<(), ServiceError> {
        let hotel = self.store.get_hotel(hotel_id).await?;
        let rooms = self.store.rooms_for_hotel(hotel_id).await?;

        let today = Utc::now().date_naive();
        for room in &rooms {
            let bookings = self.store.bookings_for_room(&room.id).await?;
            if bookings.iter().any(|b| b.is_active() && b.check_out > today) {
                return Err(ServiceError::ActiveBookings {
                    hotel_id: hotel_id.to_string(),
                });
            }
        }

        let image_keys: Vec<String> = rooms
            .iter()
            .map(|room| room.image_key.clone())
            .chain(std::iter::once(hotel.image_key.clone()))
            .collect();

        let releases =
            futures::future::join_all(image_keys.iter().map(|key| self.ledger.release(key))).await;
        for (key, result) in image_keys.iter().zip(releases) {
            match result {
                Ok(()) => {}
                // An asset the ledger never saw or already dropped is fine here
                Err(LedgerError::NotFound(_)) => {
                    tracing::debug!(key = %key, "image already gone during hotel delete");
                }
                Err(LedgerError::Storage(msg)) => return Err(ServiceError::Storage(msg)),
            }
        }

        for room in &rooms {
            self.store.remove_room(&room.id).await?;
        }
        self.store.remove_hotel(hotel_id).await?;
        tracing::info!(hotel_id = %hotel_id, rooms = rooms.len(), "hotel deleted");
        Ok(())
    }
}
