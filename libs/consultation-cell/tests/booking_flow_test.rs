use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultation_cell::models::{
    BookSlotRequest, BookingStatus, ConsultationError, CreateSlotRequest, SettlementError,
};
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

fn slot_request(price: rust_decimal::Decimal, seats: u32) -> CreateSlotRequest {
    CreateSlotRequest {
        scheduled_at: Utc::now() + Duration::days(7),
        specialty: "Cardiology".to_string(),
        doctor_name: "Dr. House".to_string(),
        price,
        total_seats: seats,
    }
}

fn book_request(points: rust_decimal::Decimal) -> BookSlotRequest {
    BookSlotRequest {
        points_used: points,
        notes: None,
    }
}

async fn mock_balance(server: &MockServer, patient_id: Uuid, balance: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/balance-and-history", patient_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(MockLedgerResponses::balance_and_history(
                balance,
            )),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn booking_with_points_discounts_price() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "10.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "patient_id": patient_id,
            "balance": "7.00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(100.00), 5)).unwrap();

    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(3)), TOKEN)
        .await
        .unwrap();

    assert_eq!(created.status, BookingStatus::Created);
    assert_eq!(created.points_used, dec!(3));
    assert_eq!(created.amount_paid, dec!(85.00));
    assert!(created.code.starts_with("AGD"));
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 1);
}

#[tokio::test]
async fn points_discount_never_pushes_amount_below_zero() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "50.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(20.00), 5)).unwrap();

    // 10 points are worth 50.00, more than the 20.00 price
    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(10)), TOKEN)
        .await
        .unwrap();
    assert_eq!(created.amount_paid, dec!(0));
}

#[tokio::test]
async fn booking_without_points_skips_the_ledger() {
    // No mocks mounted: any ledger call would fail the booking.
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(60.00), 2)).unwrap();

    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    assert_eq!(created.amount_paid, dec!(60.00));
}

#[tokio::test]
async fn insufficient_balance_takes_no_seat() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "2.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(100.00), 5)).unwrap();

    let err = booking
        .book_slot(slot.id, patient_id, book_request(dec!(3)), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ConsultationError::InsufficientPoints {
            balance,
            requested
        } if balance == dec!(2.00) && requested == dec!(3)
    );
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
    assert!(booking.list_patient_bookings(patient_id).is_empty());
}

#[tokio::test]
async fn failed_deduction_rolls_the_booking_back() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "10.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(100.00), 5)).unwrap();

    let err = booking
        .book_slot(slot.id, patient_id, book_request(dec!(2)), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ConsultationError::Settlement(SettlementError::Communication(_))
    );

    // Seat released, no booking left behind
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
    assert!(booking.list_patient_bookings(patient_id).is_empty());
}

#[tokio::test]
async fn duplicate_active_booking_is_rejected() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();

    booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    let err = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::DuplicateBooking);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 1);
}

#[tokio::test]
async fn attended_booking_still_blocks_rebooking() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    // Within the check-in window so the booking can reach attended
    let mut request = slot_request(dec!(50.00), 5);
    request.scheduled_at = Utc::now() + Duration::hours(24);
    let slot = slots.create_slot(request).unwrap();

    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    booking.check_in(created.id, patient_id, Utc::now()).unwrap();
    booking
        .confirm_attendance(&created.code, Utc::now())
        .unwrap();

    let err = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::DuplicateBooking);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 1);
}

#[tokio::test]
async fn cancelled_booking_allows_rebooking() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();

    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    booking
        .cancel_booking(created.id, patient_id, TOKEN)
        .await
        .unwrap();

    let rebooked = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    assert_eq!(rebooked.status, BookingStatus::Created);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 1);
}

#[tokio::test]
async fn note_length_is_counted_in_characters() {
    let server = MockServer::start().await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();

    // 300 three-byte characters exceed 500 bytes but not 500 characters
    let multibyte = booking
        .book_slot(
            slot.id,
            Uuid::new_v4(),
            BookSlotRequest {
                points_used: dec!(0),
                notes: Some("あ".repeat(300)),
            },
            TOKEN,
        )
        .await
        .unwrap();
    assert!(multibyte.notes.is_some());

    let err = booking
        .book_slot(
            slot.id,
            Uuid::new_v4(),
            BookSlotRequest {
                points_used: dec!(0),
                notes: Some("x".repeat(501)),
            },
            TOKEN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::Validation(_));
}

#[tokio::test]
async fn cancel_refunds_points_and_frees_the_seat() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "10.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/add", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(100.00), 5)).unwrap();
    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(3)), TOKEN)
        .await
        .unwrap();

    let cancelled = booking
        .cancel_booking(created.id, patient_id, TOKEN)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
}

#[tokio::test]
async fn failed_refund_leaves_the_booking_active() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    mock_balance(&server, patient_id, "10.00").await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/deduct", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/points/add", patient_id)))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(100.00), 5)).unwrap();
    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(2)), TOKEN)
        .await
        .unwrap();

    let err = booking
        .cancel_booking(created.id, patient_id, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ConsultationError::Settlement(SettlementError::Communication(_))
    );

    // The booking still holds its seat; nothing was lost.
    assert_eq!(
        booking.get_booking(created.id).unwrap().status,
        BookingStatus::Created
    );
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 1);
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();
    let created = booking
        .book_slot(slot.id, owner, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();

    let err = booking
        .cancel_booking(created.id, intruder, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::NotOwner);
}

#[tokio::test]
async fn cancelling_twice_fails_the_second_time() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let slot = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();
    let created = booking
        .book_slot(slot.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();

    booking
        .cancel_booking(created.id, patient_id, TOKEN)
        .await
        .unwrap();
    let err = booking
        .cancel_booking(created.id, patient_id, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::CancellationInvalid(_));
    assert_eq!(slots.get_slot(slot.id).unwrap().occupied_seats, 0);
}

#[tokio::test]
async fn my_bookings_are_most_recent_first() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    let (slots, booking) = services(&server.uri());
    let first = slots.create_slot(slot_request(dec!(50.00), 5)).unwrap();
    let second = slots.create_slot(slot_request(dec!(70.00), 5)).unwrap();

    booking
        .book_slot(first.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();
    booking
        .book_slot(second.id, patient_id, book_request(dec!(0)), TOKEN)
        .await
        .unwrap();

    let mine = booking.list_patient_bookings(patient_id);
    assert_eq!(mine.len(), 2);
    assert!(mine[0].booked_at >= mine[1].booked_at);
    assert_eq!(mine[0].slot_id, second.id);
}
