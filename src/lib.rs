// Main library file for the hotel booking core

// Export the listing, asset and booking modules
pub mod asset_ledger;
pub mod booking;
pub mod domain;
pub mod draft;
pub mod geo;
pub mod service;
pub mod store;

// Re-export key types for convenience
pub use asset_ledger::{
    AssetOwner, AssetStore, ImageAssetLedger, InMemoryAssetStore, LedgerError, LedgerStatsReport,
    UploadedAsset,
};
pub use booking::{
    BookingEngine, BookingError, BookingRequest, DayOccupancy, EngineStatsReport,
    OccupancyCalendar,
};
pub use domain::{
    Booking, BookingStatus, GuestDetails, Hotel, HotelAmenities, PaymentInfo, Room, RoomAmenities,
};
pub use draft::{
    DraftError, DraftManager, DraftState, FieldErrors, HotelDraft, RoomDraft, ValidationLimits,
};
pub use geo::{GeoLookup, GeoPlace, StaticGeoDirectory};
pub use service::{HotelDetails, ListingService, ServiceError};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
