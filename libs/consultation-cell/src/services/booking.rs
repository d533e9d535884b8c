use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    BookSlotRequest, Booking, BookingStatus, ConsultationError, MAX_NOTES_LEN, POINT_VALUE,
};
use crate::services::lifecycle;
use crate::services::settlement::SettlementService;
use crate::store::ConsultationStore;

/// Booking lifecycle: create with points settlement, cancel with refund,
/// check-in and attendance confirmation.
#[derive(Debug, Clone)]
pub struct BookingService {
    store: ConsultationStore,
    settlement: SettlementService,
}

impl BookingService {
    pub fn new(config: &AppConfig, store: ConsultationStore) -> Self {
        Self {
            store,
            settlement: SettlementService::new(config),
        }
    }

    /// Book a seat on a slot, optionally paying part of the price in points.
    ///
    /// The seat is taken and the booking inserted atomically; the points
    /// deduction then runs against the ledger, and if it fails the booking
    /// is aborted and the seat released. Either the booking exists with its
    /// points settled, or nothing changed.
    pub async fn book_slot(
        &self,
        slot_id: Uuid,
        patient_id: Uuid,
        request: BookSlotRequest,
        token: &str,
    ) -> Result<Booking, ConsultationError> {
        if request.points_used < dec!(0) {
            return Err(ConsultationError::Validation(
                "points_used cannot be negative".to_string(),
            ));
        }
        if let Some(notes) = &request.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(ConsultationError::Validation(format!(
                    "notes cannot exceed {} characters",
                    MAX_NOTES_LEN
                )));
            }
        }

        let slot = self.store.get_slot(slot_id)?;
        let amount_paid = Self::amount_due(slot.price, request.points_used);

        if request.points_used > dec!(0) {
            let balance = self.settlement.fetch_balance(patient_id, token).await?;
            if balance < request.points_used {
                return Err(ConsultationError::InsufficientPoints {
                    balance,
                    requested: request.points_used,
                });
            }
        }

        let booking = self.store.begin_booking(
            slot_id,
            patient_id,
            request.points_used,
            amount_paid,
            request.notes,
        )?;

        if request.points_used > dec!(0) {
            let reason = format!("CONSULTATION USE - booking: {}", booking.code);
            if let Err(err) = self
                .settlement
                .deduct_points(patient_id, request.points_used, &reason, token)
                .await
            {
                self.store.abort_booking(booking.id);
                return Err(err.into());
            }
        }

        info!(
            booking_code = %booking.code,
            %patient_id,
            slot_code = %slot.code,
            points_used = %booking.points_used,
            amount_paid = %booking.amount_paid,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel the patient's own booking, refunding any points it used.
    ///
    /// The cancellation is claimed in the store before the refund leaves the
    /// process, so concurrent cancels of the same booking credit the points
    /// at most once. If the ledger refuses the refund the claim is reverted
    /// and the booking keeps its seat, so the patient does not lose both the
    /// seat and the points.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        patient_id: Uuid,
        token: &str,
    ) -> Result<Booking, ConsultationError> {
        let claimed = self.store.claim_cancellation(booking_id, patient_id)?;

        if claimed.points_used > dec!(0) {
            let reason = format!("BOOKING CANCELLED - booking: {}", claimed.code);
            if let Err(err) = self
                .settlement
                .add_points(
                    patient_id,
                    claimed.points_used,
                    &reason,
                    "booking_cancel_refund",
                    token,
                )
                .await
            {
                self.store.reopen_booking(booking_id, claimed.status)?;
                return Err(err.into());
            }
        }

        let cancelled = self.store.finish_cancellation(booking_id)?;
        info!(booking_code = %cancelled.code, %patient_id, "Booking cancelled");
        Ok(cancelled)
    }

    /// Check a patient in for their booking. Allowed from 48 hours before
    /// the slot time until the slot starts.
    pub fn check_in(
        &self,
        booking_id: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking, ConsultationError> {
        let booking = self.store.transition_booking(booking_id, |booking, slot| {
            if booking.patient_id != patient_id {
                return Err(ConsultationError::NotOwner);
            }
            lifecycle::validate_transition(booking.status, BookingStatus::CheckedIn).map_err(
                |_| {
                    ConsultationError::CheckinInvalid(format!(
                        "booking status is {}",
                        booking.status
                    ))
                },
            )?;
            lifecycle::check_in_window(slot.scheduled_at, now)?;
            booking.status = BookingStatus::CheckedIn;
            booking.checked_in_at = Some(now);
            Ok(())
        })?;
        info!(booking_code = %booking.code, %patient_id, "Patient checked in");
        Ok(booking)
    }

    /// Staff confirms that a checked-in patient was actually seen, by the
    /// booking code on the patient's confirmation.
    pub fn confirm_attendance(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, ConsultationError> {
        let found = self.store.find_booking_by_code(code)?;
        let booking = self.store.transition_booking(found.id, |booking, _slot| {
            lifecycle::validate_transition(booking.status, BookingStatus::Attended).map_err(
                |_| {
                    ConsultationError::ConfirmationInvalid(format!(
                        "booking status is {}",
                        booking.status
                    ))
                },
            )?;
            booking.status = BookingStatus::Attended;
            booking.confirmed_at = Some(now);
            Ok(())
        })?;
        info!(booking_code = %booking.code, "Attendance confirmed");
        Ok(booking)
    }

    pub fn get_booking(&self, booking_id: Uuid) -> Result<Booking, ConsultationError> {
        self.store.get_booking(booking_id)
    }

    pub fn list_patient_bookings(&self, patient_id: Uuid) -> Vec<Booking> {
        self.store.bookings_for_patient(patient_id)
    }

    /// Currency still owed after the points discount, for display purposes.
    pub fn amount_due(price: Decimal, points_used: Decimal) -> Decimal {
        (price - points_used * POINT_VALUE).max(dec!(0))
    }
}
