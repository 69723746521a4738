// Domain records for the hotel listing and booking core

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// Amenity flags shown on the hotel details page
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelAmenities {
    pub gym: bool,
    pub spa: bool,
    pub bar: bool,
    pub laundry: bool,
    pub restaurant: bool,
    pub shopping: bool,
    pub free_parking: bool,
    pub bike_rental: bool,
    pub free_wifi: bool,
    pub movie_nights: bool,
    pub swimming_pool: bool,
    pub coffee_shop: bool,
}

// Amenity flags shown on the room card
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAmenities {
    pub room_service: bool,
    pub tv: bool,
    pub balcony: bool,
    pub free_wifi: bool,
    pub city_view: bool,
    pub ocean_view: bool,
    pub forest_view: bool,
    pub mountain_view: bool,
    pub air_condition: bool,
    pub sound_proofed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    // Storage-provider key of the primary image, not its public URL
    pub image_key: String,
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub location_description: String,
    pub amenities: HotelAmenities,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub hotel_id: String,
    pub title: String,
    pub description: String,
    pub bed_count: u32,
    pub guest_count: u32,
    pub bathroom_count: u32,
    pub king_bed_count: u32,
    pub queen_bed_count: u32,
    // Price per night
    pub room_price: f64,
    pub breakfast_price: Option<f64>,
    pub image_key: String,
    pub amenities: RoomAmenities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub card_type: String,
    pub last_four: String,
    pub expiry: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub room_id: String,
    pub hotel_id: String,
    pub guest: GuestDetails,
    pub payment: PaymentInfo,
    // Half-open stay interval [check_in, check_out)
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub breakfast_included: bool,
    pub total_price: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    // Half-open overlap against a candidate stay
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        ranges_overlap(self.check_in, self.check_out, check_in, check_out)
    }
}

// Two half-open intervals [a_in, a_out) and [b_in, b_out) overlap iff each
// starts before the other ends. Checkout day N and check-in day N never clash.
pub fn ranges_overlap(
    a_in: NaiveDate,
    a_out: NaiveDate,
    b_in: NaiveDate,
    b_out: NaiveDate,
) -> bool {
    a_in < b_out && b_in < a_out
}

pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

// Total price for a stay: per-night room price, plus per-night breakfast when
// the room offers it and the guest opted in
pub fn stay_price(
    room: &Room,
    check_in: NaiveDate,
    check_out: NaiveDate,
    include_breakfast: bool,
) -> f64 {
    let nights = nights(check_in, check_out) as f64;
    let mut total = room.room_price * nights;
    if include_breakfast {
        if let Some(breakfast) = room.breakfast_price {
            total += breakfast * nights;
        }
    }
    total
}

// Opaque record id, e.g. "hotel-1a2b3c4d"
pub fn new_id(prefix: &str) -> String {
    format!("{}-{:08x}", prefix, rand::random::<u32>())
}
