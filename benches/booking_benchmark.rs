use chrono::{Days, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hotel_booking_core::domain::{
    Hotel, HotelAmenities, Room, RoomAmenities, GuestDetails, PaymentInfo,
};
use hotel_booking_core::{BookingEngine, BookingRequest, InMemoryRecordStore, RecordStore};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

// Seed a room with `stays` non-overlapping one-night bookings spread over a year
async fn seeded_engine(stays: usize) -> (BookingEngine, String) {
    let store = Arc::new(InMemoryRecordStore::new());
    let today = Utc::now().date_naive();

    let hotel = Hotel {
        id: "hotel-bench".to_string(),
        owner_id: "owner-bench".to_string(),
        title: "Benchmark Hotel".to_string(),
        description: "A hotel used only for benchmarking".to_string(),
        image_key: "key-hotel".to_string(),
        country: "US".to_string(),
        state: None,
        city: None,
        location_description: "Nowhere in particular, by the lake".to_string(),
        amenities: HotelAmenities::default(),
        created_at: Utc::now(),
    };
    let room = Room {
        id: "room-bench".to_string(),
        hotel_id: hotel.id.clone(),
        title: "Benchmark Room".to_string(),
        description: "A room used only for benchmarking".to_string(),
        bed_count: 2,
        guest_count: 2,
        bathroom_count: 1,
        king_bed_count: 0,
        queen_bed_count: 1,
        room_price: 100.0,
        breakfast_price: None,
        image_key: "key-room".to_string(),
        amenities: RoomAmenities::default(),
    };
    store.insert_hotel(hotel).await.unwrap();
    let room_id = room.id.clone();
    store.insert_room(room).await.unwrap();

    let engine = BookingEngine::new(store);
    for i in 0..stays {
        // every other night, so availability probes hit both outcomes
        let check_in = today + Days::new(1 + (i as u64) * 2);
        let request = BookingRequest {
            room_id: room_id.clone(),
            check_in,
            check_out: check_in + Days::new(1),
            guest: GuestDetails {
                name: format!("Guest {}", i),
                email: format!("guest{}@example.com", i),
            },
            payment: PaymentInfo {
                card_type: "visa".to_string(),
                last_four: "4242".to_string(),
                expiry: "12/27".to_string(),
                token: None,
            },
            include_breakfast: false,
        };
        engine.create_booking(request).await.unwrap();
    }

    (engine, room_id)
}

pub fn availability_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("room_availability");

    for stays in [10, 100, 1000].iter() {
        let (engine, room_id) = rt.block_on(seeded_engine(*stays));
        let today = Utc::now().date_naive();

        group.bench_with_input(BenchmarkId::from_parameter(stays), stays, |b, &stays| {
            b.iter(|| {
                let mut rng = rand::thread_rng();
                let offset = rng.gen_range(1..(stays as u64 * 2 + 2));
                let check_in = today + Days::new(offset);
                let available = rt
                    .block_on(engine.is_available(&room_id, check_in, check_in + Days::new(2)))
                    .unwrap();
                black_box(available)
            });
        });
    }

    group.finish();
}

pub fn occupancy_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("occupancy_calendar");

    for stays in [10, 100, 1000].iter() {
        let (engine, room_id) = rt.block_on(seeded_engine(*stays));
        let today = Utc::now().date_naive();

        group.bench_with_input(BenchmarkId::from_parameter(stays), stays, |b, _| {
            b.iter(|| {
                let calendar = rt
                    .block_on(engine.compute_occupancy(
                        &room_id,
                        today,
                        today + Days::new(90),
                    ))
                    .unwrap();
                let occupied = calendar.days().filter(|d| d.occupied).count();
                black_box(occupied)
            });
        });
    }

    group.finish();
}

// Contention on the per-room commit path: several tasks book disjoint nights
// on one room at once, all funnelling through the same shard entry lock
pub fn commit_contention_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("booking_commit_contention");

    for tasks in [2, 8, 32].iter() {
        let (engine, room_id) = rt.block_on(seeded_engine(0));
        let engine = Arc::new(engine);
        let today = Utc::now().date_naive();
        let next_offset = Arc::new(AtomicU64::new(1));

        group.bench_with_input(BenchmarkId::from_parameter(tasks), tasks, |b, &tasks| {
            b.iter(|| {
                let committed = rt.block_on(async {
                    let mut handles = Vec::with_capacity(tasks);
                    for _ in 0..tasks {
                        let engine = engine.clone();
                        let room_id = room_id.clone();
                        let offset = next_offset.fetch_add(1, Ordering::Relaxed);
                        handles.push(tokio::spawn(async move {
                            let check_in = today + Days::new(offset);
                            let request = BookingRequest {
                                room_id,
                                check_in,
                                check_out: check_in + Days::new(1),
                                guest: GuestDetails {
                                    name: "Load Guest".to_string(),
                                    email: "load@example.com".to_string(),
                                },
                                payment: PaymentInfo {
                                    card_type: "visa".to_string(),
                                    last_four: "4242".to_string(),
                                    expiry: "12/27".to_string(),
                                    token: None,
                                },
                                include_breakfast: false,
                            };
                            engine.create_booking(request).await.is_ok()
                        }));
                    }
                    let results = futures::future::join_all(handles).await;
                    results.into_iter().filter(|r| *r.as_ref().unwrap()).count()
                });
                black_box(committed)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    availability_benchmark,
    occupancy_benchmark,
    commit_contention_benchmark
);
criterion_main!(benches);
