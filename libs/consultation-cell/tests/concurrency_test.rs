use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultation_cell::models::{BookSlotRequest, CreateSlotRequest};
use consultation_cell::services::booking::BookingService;
use consultation_cell::services::slots::SlotService;
use consultation_cell::store::ConsultationStore;
use shared_utils::test_utils::{MockLedgerResponses, TestConfig};

const TOKEN: &str = "test-token";

fn services(ledger_url: &str) -> (SlotService, BookingService) {
    let config = TestConfig::with_patient_service_url(ledger_url).to_app_config();
    let store = ConsultationStore::new();
    (
        SlotService::new(&config, store.clone()),
        BookingService::new(&config, store),
    )
}

fn slot_request(seats: u32) -> CreateSlotRequest {
    CreateSlotRequest {
        scheduled_at: Utc::now() + Duration::days(3),
        specialty: "Dermatology".to_string(),
        doctor_name: "Dr. Grey".to_string(),
        price: dec!(80.00),
        total_seats: seats,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn last_seat_admits_exactly_one_of_two() {
    let server = MockServer::start().await;
    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(1)).unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let booking = booking.clone();
            let slot_id = slot.id;
            tokio::spawn(async move {
                booking
                    .book_slot(
                        slot_id,
                        Uuid::new_v4(),
                        BookSlotRequest {
                            points_used: dec!(0),
                            notes: None,
                        },
                        TOKEN,
                    )
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    let slot = slots.get_slot(slot.id).unwrap();
    assert_eq!(slot.occupied_seats, 1);
    assert!(!slot.has_free_seats());
}

#[tokio::test(flavor = "multi_thread")]
async fn seat_count_caps_concurrent_admissions() {
    let server = MockServer::start().await;
    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(3)).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let booking = booking.clone();
            let slot_id = slot.id;
            tokio::spawn(async move {
                booking
                    .book_slot(
                        slot_id,
                        Uuid::new_v4(),
                        BookSlotRequest {
                            points_used: dec!(0),
                            notes: None,
                        },
                        TOKEN,
                    )
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_cancels_release_the_seat_once() {
    let server = MockServer::start().await;
    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(5)).unwrap();
    let patient_id = Uuid::new_v4();

    let created = booking
        .book_slot(
            slot.id,
            patient_id,
            BookSlotRequest {
                points_used: dec!(0),
                notes: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let booking = booking.clone();
            let booking_id = created.id;
            tokio::spawn(async move {
                booking
                    .cancel_booking(booking_id, patient_id, TOKEN)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_cancels_refund_at_most_once() {
    let server = MockServer::start().await;
    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(5)).unwrap();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/{}/balance-and-history", patient_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockLedgerResponses::balance_and_history("10.00")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    // The losing cancels must never reach the ledger.
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/add", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let created = booking
        .book_slot(
            slot.id,
            patient_id,
            BookSlotRequest {
                points_used: dec!(2),
                notes: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let booking = booking.clone();
            let booking_id = created.id;
            tokio::spawn(async move {
                booking
                    .cancel_booking(booking_id, patient_id, TOKEN)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
}
