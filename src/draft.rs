// Listing draft lifecycle: the create/update state machine for hotels and
// their rooms, including image swap bookkeeping against the asset ledger

use crate::asset_ledger::{AssetOwner, ImageAssetLedger, LedgerError};
use crate::domain::{new_id, Hotel, HotelAmenities, Room, RoomAmenities};
use crate::store::{RecordStore, StoreError};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// Per-draft states: Empty -> Editing -> Submitting -> {Persisted | Failed}.
// Persisted and Failed drafts may be edited and resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    Editing,
    Submitting,
    Persisted,
    Failed,
}

// Field-keyed error map, one message per offending field
pub type FieldErrors = BTreeMap<String, String>;

// JSON shape handed to UI/API layers for inline display
pub fn field_errors_json(errors: &FieldErrors) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = errors
        .iter()
        .map(|(field, message)| (field.clone(), serde_json::Value::String(message.clone())))
        .collect();
    serde_json::Value::Object(map)
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("a submit for this draft is already in flight")]
    SubmitInFlight,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for DraftError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(key) => DraftError::NotFound(format!("asset {}", key)),
            LedgerError::Storage(msg) => DraftError::Storage(msg),
        }
    }
}

impl From<StoreError> for DraftError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DraftError::NotFound(what),
            other => DraftError::Storage(other.to_string()),
        }
    }
}

// Validation thresholds from the listing form contract
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    pub min_title_len: usize,
    pub min_description_len: usize,
    pub min_location_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_title_len: 3,
            min_description_len: 10,
            min_location_len: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HotelDraft {
    // Present on the update path, absent on create
    pub id: Option<String>,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub image_key: Option<String>,
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub location_description: String,
    pub amenities: HotelAmenities,
    // The image the persisted record currently points at; never released on swap
    committed_image: Option<String>,
    lifecycle: DraftState,
}

impl HotelDraft {
    pub fn new(owner_id: &str) -> Self {
        Self {
            id: None,
            owner_id: owner_id.to_string(),
            title: String::new(),
            description: String::new(),
            image_key: None,
            country: String::new(),
            state: None,
            city: None,
            location_description: String::new(),
            amenities: HotelAmenities::default(),
            committed_image: None,
            lifecycle: DraftState::Empty,
        }
    }

    // Update path: prefill from the persisted record
    pub fn for_hotel(hotel: &Hotel) -> Self {
        Self {
            id: Some(hotel.id.clone()),
            owner_id: hotel.owner_id.clone(),
            title: hotel.title.clone(),
            description: hotel.description.clone(),
            image_key: Some(hotel.image_key.clone()),
            country: hotel.country.clone(),
            state: hotel.state.clone(),
            city: hotel.city.clone(),
            location_description: hotel.location_description.clone(),
            amenities: hotel.amenities.clone(),
            committed_image: Some(hotel.image_key.clone()),
            lifecycle: DraftState::Editing,
        }
    }

    pub fn state(&self) -> DraftState {
        self.lifecycle
    }

    pub fn committed_image(&self) -> Option<&str> {
        self.committed_image.as_deref()
    }

    fn touch(&mut self) {
        if self.lifecycle == DraftState::Empty {
            self.lifecycle = DraftState::Editing;
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.touch();
        self.title = title.to_string();
    }

    pub fn set_description(&mut self, description: &str) {
        self.touch();
        self.description = description.to_string();
    }

    pub fn set_location(&mut self, country: &str, state: Option<&str>, city: Option<&str>) {
        self.touch();
        self.country = country.to_string();
        self.state = state.map(str::to_string);
        self.city = city.map(str::to_string);
    }

    pub fn set_location_description(&mut self, text: &str) {
        self.touch();
        self.location_description = text.to_string();
    }

    pub fn set_amenities(&mut self, amenities: HotelAmenities) {
        self.touch();
        self.amenities = amenities;
    }

    // Swaps the displayed image. The previous key is released unless it is the
    // committed value (still referenced by the record) or the new key itself.
    // On release failure the draft keeps the old image so the swap can be retried.
    pub async fn swap_image(
        &mut self,
        ledger: &ImageAssetLedger,
        new_key: &str,
    ) -> Result<(), DraftError> {
        self.touch();
        if let Some(prev) = self.image_key.clone() {
            if self.committed_image.as_deref() != Some(prev.as_str()) && prev != new_key {
                ledger.release(&prev).await?;
            }
        }
        self.image_key = Some(new_key.to_string());
        Ok(())
    }

    // Discards the draft: an uncommitted image must not linger in storage
    pub async fn abandon(&mut self, ledger: &ImageAssetLedger) -> Result<(), DraftError> {
        if let Some(prev) = self.image_key.clone() {
            if self.committed_image.as_deref() != Some(prev.as_str()) {
                ledger.release(&prev).await?;
            }
        }
        self.image_key = self.committed_image.clone();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RoomDraft {
    pub id: Option<String>,
    // Parent hotel; rooms are always scoped to an existing hotel identity
    pub hotel_id: String,
    pub title: String,
    pub description: String,
    pub bed_count: u32,
    pub guest_count: u32,
    pub bathroom_count: u32,
    pub king_bed_count: u32,
    pub queen_bed_count: u32,
    pub room_price: f64,
    pub breakfast_price: Option<f64>,
    pub image_key: Option<String>,
    pub amenities: RoomAmenities,
    committed_image: Option<String>,
    state: DraftState,
}

impl RoomDraft {
    pub fn new(hotel_id: &str) -> Self {
        Self {
            id: None,
            hotel_id: hotel_id.to_string(),
            title: String::new(),
            description: String::new(),
            bed_count: 0,
            guest_count: 0,
            bathroom_count: 0,
            king_bed_count: 0,
            queen_bed_count: 0,
            room_price: 0.0,
            breakfast_price: None,
            image_key: None,
            amenities: RoomAmenities::default(),
            committed_image: None,
            state: DraftState::Empty,
        }
    }

    pub fn for_room(room: &Room) -> Self {
        Self {
            id: Some(room.id.clone()),
            hotel_id: room.hotel_id.clone(),
            title: room.title.clone(),
            description: room.description.clone(),
            bed_count: room.bed_count,
            guest_count: room.guest_count,
            bathroom_count: room.bathroom_count,
            king_bed_count: room.king_bed_count,
            queen_bed_count: room.queen_bed_count,
            room_price: room.room_price,
            breakfast_price: room.breakfast_price,
            image_key: Some(room.image_key.clone()),
            amenities: room.amenities.clone(),
            committed_image: Some(room.image_key.clone()),
            state: DraftState::Editing,
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    fn touch(&mut self) {
        if self.state == DraftState::Empty {
            self.state = DraftState::Editing;
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.touch();
        self.title = title.to_string();
    }

    pub fn set_description(&mut self, description: &str) {
        self.touch();
        self.description = description.to_string();
    }

    pub fn set_capacity(&mut self, beds: u32, guests: u32, bathrooms: u32) {
        self.touch();
        self.bed_count = beds;
        self.guest_count = guests;
        self.bathroom_count = bathrooms;
    }

    pub fn set_prices(&mut self, room_price: f64, breakfast_price: Option<f64>) {
        self.touch();
        self.room_price = room_price;
        self.breakfast_price = breakfast_price;
    }

    pub fn set_amenities(&mut self, amenities: RoomAmenities) {
        self.touch();
        self.amenities = amenities;
    }

    pub async fn swap_image(
        &mut self,
        ledger: &ImageAssetLedger,
        new_key: &str,
    ) -> Result<(), DraftError> {
        self.touch();
        if let Some(prev) = self.image_key.clone() {
            if self.committed_image.as_deref() != Some(prev.as_str()) && prev != new_key {
                ledger.release(&prev).await?;
            }
        }
        self.image_key = Some(new_key.to_string());
        Ok(())
    }

    pub async fn abandon(&mut self, ledger: &ImageAssetLedger) -> Result<(), DraftError> {
        if let Some(prev) = self.image_key.clone() {
            if self.committed_image.as_deref() != Some(prev.as_str()) {
                ledger.release(&prev).await?;
            }
        }
        self.image_key = self.committed_image.clone();
        Ok(())
    }
}

// Owns submit for both draft kinds. One manager serves many drafts; the
// in-flight guard lives in each draft's state.
pub struct DraftManager {
    store: Arc<dyn RecordStore>,
    ledger: Arc<ImageAssetLedger>,
    limits: ValidationLimits,
}

impl DraftManager {
    pub fn new(store: Arc<dyn RecordStore>, ledger: Arc<ImageAssetLedger>) -> Self {
        Self::with_limits(store, ledger, ValidationLimits::default())
    }

    pub fn with_limits(
        store: Arc<dyn RecordStore>,
        ledger: Arc<ImageAssetLedger>,
        limits: ValidationLimits,
    ) -> Self {
        Self {
            store,
            ledger,
            limits,
        }
    }

    // Pure validation, re-run on every submit
    pub fn validate_hotel(&self, draft: &HotelDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if draft.title.chars().count() < self.limits.min_title_len {
            errors.insert(
                "title".to_string(),
                format!("title must be at least {} characters long", self.limits.min_title_len),
            );
        }
        if draft.description.chars().count() < self.limits.min_description_len {
            errors.insert(
                "description".to_string(),
                format!(
                    "description must be at least {} characters long",
                    self.limits.min_description_len
                ),
            );
        }
        if draft.image_key.is_none() {
            errors.insert("image".to_string(), "image is required".to_string());
        }
        if draft.country.is_empty() {
            errors.insert("country".to_string(), "country is required".to_string());
        }
        if draft.location_description.chars().count() < self.limits.min_location_len {
            errors.insert(
                "location_description".to_string(),
                format!(
                    "location description must be at least {} characters long",
                    self.limits.min_location_len
                ),
            );
        }
        errors
    }

    pub fn validate_room(&self, draft: &RoomDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if draft.title.chars().count() < self.limits.min_title_len {
            errors.insert(
                "title".to_string(),
                format!("title must be at least {} characters long", self.limits.min_title_len),
            );
        }
        if draft.description.chars().count() < self.limits.min_description_len {
            errors.insert(
                "description".to_string(),
                format!(
                    "description must be at least {} characters long",
                    self.limits.min_description_len
                ),
            );
        }
        if draft.image_key.is_none() {
            errors.insert("image".to_string(), "image is required".to_string());
        }
        if draft.bed_count < 1 {
            errors.insert("bed_count".to_string(), "bed count is required".to_string());
        }
        if draft.guest_count < 1 {
            errors.insert("guest_count".to_string(), "guest count is required".to_string());
        }
        if draft.bathroom_count < 1 {
            errors.insert(
                "bathroom_count".to_string(),
                "bathroom count is required".to_string(),
            );
        }
        if draft.room_price <= 0.0 {
            errors.insert("room_price".to_string(), "room price is required".to_string());
        }
        errors
    }

    // Two-path submit: creates when the draft has no identity, updates when it
    // has one. Validation failure moves the draft to Failed without touching
    // the store; a submit racing an in-flight one is rejected, not queued.
    pub async fn submit_hotel(&self, draft: &Mutex<HotelDraft>) -> Result<String, DraftError> {
        let snapshot = {
            let mut d = draft.lock();
            if d.lifecycle == DraftState::Submitting {
                return Err(DraftError::SubmitInFlight);
            }
            let errors = self.validate_hotel(&d);
            if !errors.is_empty() {
                d.lifecycle = DraftState::Failed;
                tracing::debug!(fields = errors.len(), "hotel draft failed validation");
                return Err(DraftError::Validation(errors));
            }
            d.lifecycle = DraftState::Submitting;
            d.clone()
        };

        let image_key = match snapshot.image_key.clone() {
            Some(key) => key,
            // Unreachable after validation; treated as a failed submit
            None => {
                draft.lock().lifecycle = DraftState::Failed;
                return Err(DraftError::Storage("draft lost its image".to_string()));
            }
        };

        let persisted = match snapshot.id.clone() {
            Some(id) => self.update_hotel_record(&snapshot, &id, &image_key).await,
            None => self.insert_hotel_record(&snapshot, &image_key).await,
        };

        match persisted {
            Ok(hotel_id) => {
                let replaced = self
                    .ledger
                    .attach(AssetOwner::Hotel(hotel_id.clone()), &image_key);
                self.release_replaced(replaced, &image_key).await;

                let mut d = draft.lock();
                d.lifecycle = DraftState::Persisted;
                d.id = Some(hotel_id.clone());
                d.committed_image = Some(image_key);
                tracing::info!(hotel_id = %hotel_id, "hotel draft persisted");
                Ok(hotel_id)
            }
            Err(err) => {
                draft.lock().lifecycle = DraftState::Failed;
                tracing::debug!(error = %err, "hotel draft submit failed");
                Err(err)
            }
        }
    }

    async fn insert_hotel_record(
        &self,
        snapshot: &HotelDraft,
        image_key: &str,
    ) -> Result<String, DraftError> {
        let hotel_id = new_id("hotel");
        let hotel = Hotel {
            id: hotel_id.clone(),
            owner_id: snapshot.owner_id.clone(),
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            image_key: image_key.to_string(),
            country: snapshot.country.clone(),
            state: snapshot.state.clone(),
            city: snapshot.city.clone(),
            location_description: snapshot.location_description.clone(),
            amenities: snapshot.amenities.clone(),
            created_at: Utc::now(),
        };
        self.store.insert_hotel(hotel).await?;
        Ok(hotel_id)
    }

    async fn update_hotel_record(
        &self,
        snapshot: &HotelDraft,
        hotel_id: &str,
        image_key: &str,
    ) -> Result<String, DraftError> {
        // Rooms are stored under their own keys, so updating the hotel record
        // leaves its room associations untouched
        let existing = self.store.get_hotel(hotel_id).await?;
        let hotel = Hotel {
            id: hotel_id.to_string(),
            owner_id: existing.owner_id,
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            image_key: image_key.to_string(),
            country: snapshot.country.clone(),
            state: snapshot.state.clone(),
            city: snapshot.city.clone(),
            location_description: snapshot.location_description.clone(),
            amenities: snapshot.amenities.clone(),
            created_at: existing.created_at,
        };
        self.store.update_hotel(hotel).await?;
        Ok(hotel_id.to_string())
    }

    pub async fn submit_room(&self, draft: &Mutex<RoomDraft>) -> Result<String, DraftError> {
        let snapshot = {
            let mut d = draft.lock();
            if d.state == DraftState::Submitting {
                return Err(DraftError::SubmitInFlight);
            }
            let errors = self.validate_room(&d);
            if !errors.is_empty() {
                d.state = DraftState::Failed;
                tracing::debug!(fields = errors.len(), "room draft failed validation");
                return Err(DraftError::Validation(errors));
            }
            d.state = DraftState::Submitting;
            d.clone()
        };

        let image_key = match snapshot.image_key.clone() {
            Some(key) => key,
            None => {
                draft.lock().state = DraftState::Failed;
                return Err(DraftError::Storage("draft lost its image".to_string()));
            }
        };

        let persisted = self.persist_room_record(&snapshot, &image_key).await;

        match persisted {
            Ok(room_id) => {
                let replaced = self
                    .ledger
                    .attach(AssetOwner::Room(room_id.clone()), &image_key);
                self.release_replaced(replaced, &image_key).await;

                let mut d = draft.lock();
                d.state = DraftState::Persisted;
                d.id = Some(room_id.clone());
                d.committed_image = Some(image_key);
                tracing::info!(room_id = %room_id, hotel_id = %snapshot.hotel_id, "room draft persisted");
                Ok(room_id)
            }
            Err(err) => {
                draft.lock().state = DraftState::Failed;
                tracing::debug!(error = %err, "room draft submit failed");
                Err(err)
            }
        }
    }

    async fn persist_room_record(
        &self,
        snapshot: &RoomDraft,
        image_key: &str,
    ) -> Result<String, DraftError> {
        // Both paths require the parent hotel to exist
        self.store.get_hotel(&snapshot.hotel_id).await?;

        let room_id = snapshot.id.clone().unwrap_or_else(|| new_id("room"));
        let room = Room {
            id: room_id.clone(),
            hotel_id: snapshot.hotel_id.clone(),
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            bed_count: snapshot.bed_count,
            guest_count: snapshot.guest_count,
            bathroom_count: snapshot.bathroom_count,
            king_bed_count: snapshot.king_bed_count,
            queen_bed_count: snapshot.queen_bed_count,
            room_price: snapshot.room_price,
            breakfast_price: snapshot.breakfast_price,
            image_key: image_key.to_string(),
            amenities: snapshot.amenities.clone(),
        };

        if snapshot.id.is_some() {
            self.store.update_room(room).await?;
        } else {
            self.store.insert_room(room).await?;
        }
        Ok(room_id)
    }

    // A committed image displaced by this submit is now unreferenced. The
    // record mutation already succeeded, so a failed cleanup only leaves a
    // dangling unused asset; log and move on.
    async fn release_replaced(&self, replaced: Option<String>, kept_key: &str) {
        if let Some(old_key) = replaced {
            if old_key != kept_key {
                if let Err(err) = self.ledger.release(&old_key).await {
                    tracing::warn!(key = %old_key, error = %err, "failed to release replaced image");
                }
            }
        }
    }

    // Deleting a room: release its image first, then remove the record. An
    // asset-store failure aborts the whole operation with the record intact.
    pub async fn delete_room(&self, room_id: &str) -> Result<(), DraftError> {
        let room = self.store.get_room(room_id).await?;
        self.ledger.release(&room.image_key).await?;
        self.store.remove_room(room_id).await?;
        tracing::info!(room_id = %room_id, "room deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_ledger::InMemoryAssetStore;
    use crate::store::InMemoryRecordStore;

    struct Harness {
        store: Arc<InMemoryRecordStore>,
        assets: Arc<InMemoryAssetStore>,
        ledger: Arc<ImageAssetLedger>,
        manager: DraftManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryRecordStore::new());
        let assets = Arc::new(InMemoryAssetStore::new());
        let ledger = Arc::new(ImageAssetLedger::new(assets.clone()));
        let manager = DraftManager::new(store.clone(), ledger.clone());
        Harness {
            store,
            assets,
            ledger,
            manager,
        }
    }

    async fn valid_hotel_draft(h: &Harness) -> HotelDraft {
        let asset = h.ledger.upload("front.jpg", vec![1, 2, 3]).await.unwrap();
        let mut draft = HotelDraft::new("user-1");
        draft.set_title("Beach Hotel");
        draft.set_description("Packed with many awesome amenities");
        draft.set_location("US", Some("FL"), Some("Miami"));
        draft.set_location_description("At the very end of the beach road");
        draft.swap_image(&h.ledger, &asset.key).await.unwrap();
        draft
    }

    async fn valid_room_draft(h: &Harness, hotel_id: &str) -> RoomDraft {
        let asset = h.ledger.upload("room.jpg", vec![4, 5, 6]).await.unwrap();
        let mut draft = RoomDraft::new(hotel_id);
        draft.set_title("Double Room");
        draft.set_description("Room with a view of the ocean");
        draft.set_capacity(2, 2, 1);
        draft.set_prices(120.0, Some(15.0));
        draft.swap_image(&h.ledger, &asset.key).await.unwrap();
        draft
    }

    #[tokio::test]
    async fn test_create_path_persists_and_commits_image() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);

        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();
        assert_eq!(draft.lock().state(), DraftState::Persisted);
        assert_eq!(draft.lock().id.as_deref(), Some(hotel_id.as_str()));

        let hotel = h.store.get_hotel(&hotel_id).await.unwrap();
        assert_eq!(hotel.title, "Beach Hotel");
        assert_eq!(
            h.ledger
                .key_for(&AssetOwner::Hotel(hotel_id.clone()))
                .as_deref(),
            Some(hotel.image_key.as_str())
        );
    }

    #[tokio::test]
    async fn test_short_title_fails_validation_without_store_write() {
        let h = harness();
        let mut draft = valid_hotel_draft(&h).await;
        draft.set_title("Be");
        let draft = Mutex::new(draft);

        let err = h.manager.submit_hotel(&draft).await.unwrap_err();
        match err {
            DraftError::Validation(errors) => {
                assert!(errors.contains_key("title"));
                let json = field_errors_json(&errors);
                assert!(json.get("title").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(draft.lock().state(), DraftState::Failed);
        assert_eq!(h.store.hotel_count(), 0);

        // Three characters is enough
        draft.lock().set_title("Bea");
        h.manager.submit_hotel(&draft).await.unwrap();
        assert_eq!(h.store.hotel_count(), 1);
    }

    #[tokio::test]
    async fn test_update_path_preserves_rooms_and_created_at() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);
        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();

        let room_draft = Mutex::new(valid_room_draft(&h, &hotel_id).await);
        h.manager.submit_room(&room_draft).await.unwrap();

        let before = h.store.get_hotel(&hotel_id).await.unwrap();

        let mut update = HotelDraft::for_hotel(&before);
        update.set_title("Beach Hotel Deluxe");
        let update = Mutex::new(update);
        let updated_id = h.manager.submit_hotel(&update).await.unwrap();
        assert_eq!(updated_id, hotel_id);

        let after = h.store.get_hotel(&hotel_id).await.unwrap();
        assert_eq!(after.title, "Beach Hotel Deluxe");
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(h.store.rooms_for_hotel(&hotel_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_swap_releases_only_the_discarded_key() {
        let h = harness();
        let first = h.ledger.upload("a.jpg", vec![1]).await.unwrap();
        let second = h.ledger.upload("b.jpg", vec![2]).await.unwrap();

        let mut draft = HotelDraft::new("user-1");
        draft.swap_image(&h.ledger, &first.key).await.unwrap();
        draft.swap_image(&h.ledger, &second.key).await.unwrap();

        // Exactly one release: the discarded first key, never the kept one
        assert_eq!(h.assets.deleted_keys(), vec![first.key.clone()]);
        assert!(h.assets.contains(&second.key));
        assert_eq!(draft.image_key.as_deref(), Some(second.key.as_str()));
    }

    #[tokio::test]
    async fn test_swap_never_releases_the_committed_image() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);
        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();
        let committed = h.store.get_hotel(&hotel_id).await.unwrap().image_key;

        let replacement = h.ledger.upload("new.jpg", vec![9]).await.unwrap();
        let mut editing = draft.lock().clone();
        editing.swap_image(&h.ledger, &replacement.key).await.unwrap();

        assert!(h.assets.contains(&committed));
        assert!(h.assets.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn test_successful_update_releases_the_replaced_committed_image() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);
        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();
        let old_image = h.store.get_hotel(&hotel_id).await.unwrap().image_key;

        let replacement = h.ledger.upload("new.jpg", vec![9]).await.unwrap();
        {
            let mut d = draft.lock();
            d.image_key = Some(replacement.key.clone());
        }
        h.manager.submit_hotel(&draft).await.unwrap();

        // The displaced committed image is cleaned up after the record commit
        assert!(!h.assets.contains(&old_image));
        assert!(h.assets.contains(&replacement.key));
        assert_eq!(
            h.store.get_hotel(&hotel_id).await.unwrap().image_key,
            replacement.key
        );
    }

    #[tokio::test]
    async fn test_abandoned_draft_releases_its_pending_image() {
        let h = harness();
        let asset = h.ledger.upload("front.jpg", vec![1]).await.unwrap();
        let mut draft = HotelDraft::new("user-1");
        draft.swap_image(&h.ledger, &asset.key).await.unwrap();

        draft.abandon(&h.ledger).await.unwrap();
        assert!(!h.assets.contains(&asset.key));
        assert_eq!(draft.image_key, None);
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_rejected() {
        let h = harness();
        h.store.set_write_delay_ms(100);
        let draft = Arc::new(Mutex::new(valid_hotel_draft(&h).await));
        let manager = Arc::new(h.manager);

        let first = {
            let manager = manager.clone();
            let draft = draft.clone();
            tokio::spawn(async move { manager.submit_hotel(&draft).await })
        };

        // Give the first submit time to enter the Submitting state
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = manager.submit_hotel(&draft).await;
        assert!(matches!(second, Err(DraftError::SubmitInFlight)));

        let first = first.await.unwrap();
        assert!(first.is_ok());
        assert_eq!(draft.lock().state(), DraftState::Persisted);
    }

    #[tokio::test]
    async fn test_store_failure_moves_draft_to_failed_and_allows_retry() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);

        h.store.fail_next_writes(1);
        let err = h.manager.submit_hotel(&draft).await.unwrap_err();
        assert!(matches!(err, DraftError::Storage(_)));
        assert_eq!(draft.lock().state(), DraftState::Failed);

        h.manager.submit_hotel(&draft).await.unwrap();
        assert_eq!(draft.lock().state(), DraftState::Persisted);
    }

    #[tokio::test]
    async fn test_room_create_requires_existing_parent_hotel() {
        let h = harness();
        let draft = Mutex::new(valid_room_draft(&h, "hotel-ghost").await);

        let err = h.manager.submit_room(&draft).await.unwrap_err();
        assert!(matches!(err, DraftError::NotFound(_)));
        assert_eq!(draft.lock().state(), DraftState::Failed);
    }

    #[tokio::test]
    async fn test_room_validation_covers_capacity_and_price() {
        let h = harness();
        let draft = Mutex::new(RoomDraft::new("hotel-1"));

        let err = h.manager.submit_room(&draft).await.unwrap_err();
        match err {
            DraftError::Validation(errors) => {
                for field in [
                    "title",
                    "description",
                    "image",
                    "bed_count",
                    "guest_count",
                    "bathroom_count",
                    "room_price",
                ] {
                    assert!(errors.contains_key(field), "missing error for {}", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(h.store.room_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_room_releases_image_then_record() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);
        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();
        let room_draft = Mutex::new(valid_room_draft(&h, &hotel_id).await);
        let room_id = h.manager.submit_room(&room_draft).await.unwrap();
        let image_key = h.store.get_room(&room_id).await.unwrap().image_key;

        h.manager.delete_room(&room_id).await.unwrap();

        assert!(!h.assets.contains(&image_key));
        assert!(matches!(
            h.store.get_room(&room_id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_room_aborts_when_asset_delete_fails() {
        let h = harness();
        let draft = Mutex::new(valid_hotel_draft(&h).await);
        let hotel_id = h.manager.submit_hotel(&draft).await.unwrap();
        let room_draft = Mutex::new(valid_room_draft(&h, &hotel_id).await);
        let room_id = h.manager.submit_room(&room_draft).await.unwrap();

        h.assets.fail_next_deletes(1);
        let err = h.manager.delete_room(&room_id).await.unwrap_err();
        assert!(matches!(err, DraftError::Storage(_)));

        // No partial deletion: the record and the asset both survive
        let room = h.store.get_room(&room_id).await.unwrap();
        assert!(h.assets.contains(&room.image_key));
    }
}
