// Availability and booking engine: half-open interval reconciliation against
// existing reservations, and the race-safe booking commit

use crate::domain::{new_id, stay_price, Booking, BookingStatus, GuestDetails, PaymentInfo};
use crate::store::{RecordStore, StoreError};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("invalid date range {check_in}..{check_out}: {reason}")]
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
        reason: String,
    },

    #[error("room {room_id} is unavailable for {check_in}..{check_out}")]
    RoomUnavailable {
        room_id: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("booking {0} can no longer be cancelled")]
    CancellationClosed(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BookingError::NotFound(what),
            StoreError::BookingConflict {
                room_id,
                check_in,
                check_out,
            } => BookingError::RoomUnavailable {
                room_id,
                check_in,
                check_out,
            },
            other => BookingError::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest: GuestDetails,
    pub payment: PaymentInfo,
    pub include_breakfast: bool,
}

// Per-day occupancy flag, for rendering calendars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOccupancy {
    pub date: NaiveDate,
    pub occupied: bool,
}

// Snapshot of a room's active stays over a range. days() is lazy, finite and
// can be restarted by calling it again.
#[derive(Debug, Clone)]
pub struct OccupancyCalendar {
    start: NaiveDate,
    end: NaiveDate,
    stays: Vec<(NaiveDate, NaiveDate)>,
}

impl OccupancyCalendar {
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> OccupancyDays<'_> {
        OccupancyDays {
            calendar: self,
            cursor: self.start,
        }
    }
}

pub struct OccupancyDays<'a> {
    calendar: &'a OccupancyCalendar,
    cursor: NaiveDate,
}

impl Iterator for OccupancyDays<'_> {
    type Item = DayOccupancy;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.calendar.end {
            return None;
        }
        let date = self.cursor;
        self.cursor = self.cursor.succ_opt()?;
        let occupied = self
            .calendar
            .stays
            .iter()
            .any(|(check_in, check_out)| date >= *check_in && date < *check_out);
        Some(DayOccupancy { date, occupied })
    }
}

#[derive(Debug, Default)]
struct EngineStats {
    availability_checks: AtomicUsize,
    bookings_committed: AtomicUsize,
    bookings_conflicted: AtomicUsize,
    bookings_rejected: AtomicUsize,
    cancellations: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStatsReport {
    pub availability_checks: usize,
    pub bookings_committed: usize,
    pub bookings_conflicted: usize,
    pub bookings_rejected: usize,
    pub cancellations: usize,
}

pub struct BookingEngine {
    store: Arc<dyn RecordStore>,
    stats: EngineStats,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            stats: EngineStats::default(),
        }
    }

    fn validate_range(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidRange {
                check_in,
                check_out,
                reason: "check-out must be after check-in".to_string(),
            });
        }
        Ok(())
    }

    // True iff no non-cancelled booking for the room overlaps [check_in, check_out)
    pub async fn is_available(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, BookingError> {
        Self::validate_range(check_in, check_out)?;
        self.store.get_room(room_id).await?;
        self.stats.availability_checks.fetch_add(1, Ordering::SeqCst);

        let bookings = self.store.bookings_for_room(room_id).await?;
        Ok(!bookings
            .iter()
            .any(|b| b.is_active() && b.overlaps(check_in, check_out)))
    }

    pub async fn compute_occupancy(
        &self,
        room_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OccupancyCalendar, BookingError> {
        Self::validate_range(start, end)?;
        self.store.get_room(room_id).await?;

        let stays = self
            .store
            .bookings_for_room(room_id)
            .await?
            .into_iter()
            .filter(|b| b.is_active())
            .map(|b| (b.check_in, b.check_out))
            .collect();

        Ok(OccupancyCalendar { start, end, stays })
    }

    // Availability is re-validated at commit time inside the store's atomic
    // commit, closing the race between viewing and paying. Exactly one of N
    // concurrent overlapping requests succeeds.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        Self::validate_range(request.check_in, request.check_out)?;

        let today = Utc::now().date_naive();
        if request.check_in < today {
            self.stats.bookings_rejected.fetch_add(1, Ordering::SeqCst);
            return Err(BookingError::InvalidRange {
                check_in: request.check_in,
                check_out: request.check_out,
                reason: "check-in date is in the past".to_string(),
            });
        }

        let room = self.store.get_room(&request.room_id).await?;
        let total_price = stay_price(
            &room,
            request.check_in,
            request.check_out,
            request.include_breakfast,
        );

        let booking = Booking {
            id: new_id("booking"),
            room_id: request.room_id.clone(),
            hotel_id: room.hotel_id.clone(),
            guest: request.guest,
            payment: request.payment,
            check_in: request.check_in,
            check_out: request.check_out,
            breakfast_included: request.include_breakfast,
            total_price,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };

        match self.store.commit_booking(booking.clone()).await {
            Ok(()) => {
                self.stats.bookings_committed.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    booking_id = %booking.id,
                    room_id = %booking.room_id,
                    check_in = %booking.check_in,
                    check_out = %booking.check_out,
                    "booking confirmed"
                );
                Ok(booking)
            }
            Err(err @ StoreError::BookingConflict { .. }) => {
                self.stats.bookings_conflicted.fetch_add(1, Ordering::SeqCst);
                Err(err.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    // Cancelling an already cancelled booking is a no-op; on or after the
    // check-in date the booking can no longer be cancelled.
    pub async fn cancel_booking(&self, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.store.get_booking(booking_id).await?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let today = Utc::now().date_naive();
        if today >= booking.check_in {
            return Err(BookingError::CancellationClosed(booking_id.to_string()));
        }

        let cancelled = self
            .store
            .set_booking_status(booking_id, BookingStatus::Cancelled)
            .await?;
        self.stats.cancellations.fetch_add(1, Ordering::SeqCst);
        tracing::info!(booking_id = %booking_id, "booking cancelled");
        Ok(cancelled)
    }

    pub fn stats(&self) -> EngineStatsReport {
        EngineStatsReport {
            availability_checks: self.stats.availability_checks.load(Ordering::SeqCst),
            bookings_committed: self.stats.bookings_committed.load(Ordering::SeqCst),
            bookings_conflicted: self.stats.bookings_conflicted.load(Ordering::SeqCst),
            bookings_rejected: self.stats.bookings_rejected.load(Ordering::SeqCst),
            cancellations: self.stats.cancellations.load(Ordering::SeqCst),
        }
    }
}
