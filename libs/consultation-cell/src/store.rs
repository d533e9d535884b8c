use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared_store::{Sequence, Store};

use crate::models::{Booking, BookingStatus, ConsultationError, ConsultationSlot, SlotStatus};

#[derive(Debug, Default)]
pub struct ConsultationState {
    slots: HashMap<Uuid, ConsultationSlot>,
    bookings: HashMap<Uuid, Booking>,
}

/// Store for slots and bookings. Slots and bookings share one state struct
/// so that booking admission (status check, free seat, duplicate check, seat
/// increment, booking insert) is a single critical section; concurrent
/// admissions against the same slot serialize on it and the occupied counter
/// can never overshoot the seat total.
#[derive(Debug, Clone, Default)]
pub struct ConsultationStore {
    state: Store<ConsultationState>,
    slot_codes: Arc<Sequence>,
    booking_codes: Arc<Sequence>,
}

impl ConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // SLOTS
    // ==========================================================================

    pub fn insert_slot(
        &self,
        scheduled_at: chrono::DateTime<Utc>,
        specialty: String,
        doctor_name: String,
        price: Decimal,
        total_seats: u32,
    ) -> ConsultationSlot {
        let slot = ConsultationSlot {
            id: Uuid::new_v4(),
            code: format!("CON{:03}", self.slot_codes.next()),
            scheduled_at,
            specialty,
            doctor_name,
            price,
            total_seats,
            occupied_seats: 0,
            status: SlotStatus::Available,
            created_at: Utc::now(),
        };
        self.state.write(|state| {
            state.slots.insert(slot.id, slot.clone());
        });
        slot
    }

    pub fn get_slot(&self, slot_id: Uuid) -> Result<ConsultationSlot, ConsultationError> {
        self.state.read(|state| {
            state
                .slots
                .get(&slot_id)
                .cloned()
                .ok_or(ConsultationError::SlotNotFound)
        })
    }

    pub fn list_slots(&self) -> Vec<ConsultationSlot> {
        self.state.read(|state| state.slots.values().cloned().collect())
    }

    // ==========================================================================
    // BOOKING ADMISSION
    // ==========================================================================

    /// Atomically admit a booking: validate the slot is available with a free
    /// seat, reject a second active booking by the same patient, take the
    /// seat and insert the booking in `created`.
    ///
    /// The caller settles points afterwards and must call [`abort_booking`]
    /// if that settlement fails, so a failed create leaves no trace.
    ///
    /// [`abort_booking`]: ConsultationStore::abort_booking
    pub fn begin_booking(
        &self,
        slot_id: Uuid,
        patient_id: Uuid,
        points_used: Decimal,
        amount_paid: Decimal,
        notes: Option<String>,
    ) -> Result<Booking, ConsultationError> {
        let code = format!(
            "AGD{}-{}",
            Utc::now().timestamp_millis(),
            self.booking_codes.next()
        );

        self.state.write(|state| {
            let slot = state
                .slots
                .get(&slot_id)
                .ok_or(ConsultationError::SlotNotFound)?;
            if slot.status != SlotStatus::Available {
                return Err(ConsultationError::SlotUnavailable(format!(
                    "slot status is {}",
                    slot.status
                )));
            }
            if !slot.has_free_seats() {
                return Err(ConsultationError::NoSeatsAvailable);
            }
            // One non-cancelled booking per patient per slot: an attended or
            // completed booking blocks a rebook just like an active one.
            let duplicate = state.bookings.values().any(|b| {
                b.slot_id == slot_id
                    && b.patient_id == patient_id
                    && b.status != BookingStatus::Cancelled
            });
            if duplicate {
                return Err(ConsultationError::DuplicateBooking);
            }

            let slot = state
                .slots
                .get_mut(&slot_id)
                .ok_or(ConsultationError::SlotNotFound)?;
            slot.occupied_seats += 1;

            let booking = Booking {
                id: Uuid::new_v4(),
                code,
                patient_id,
                slot_id,
                points_used,
                amount_paid,
                status: BookingStatus::Created,
                booked_at: Utc::now(),
                checked_in_at: None,
                confirmed_at: None,
                notes,
            };
            state.bookings.insert(booking.id, booking.clone());
            Ok(booking)
        })
    }

    /// Compensation for a create whose points settlement failed: remove the
    /// provisional booking and give the seat back.
    pub fn abort_booking(&self, booking_id: Uuid) {
        self.state.write(|state| {
            if let Some(booking) = state.bookings.remove(&booking_id) {
                if let Some(slot) = state.slots.get_mut(&booking.slot_id) {
                    if slot.occupied_seats > 0 {
                        slot.occupied_seats -= 1;
                    }
                }
            }
        });
    }

    // ==========================================================================
    // BOOKING LOOKUPS
    // ==========================================================================

    pub fn get_booking(&self, booking_id: Uuid) -> Result<Booking, ConsultationError> {
        self.state.read(|state| {
            state
                .bookings
                .get(&booking_id)
                .cloned()
                .ok_or(ConsultationError::BookingNotFound)
        })
    }

    pub fn find_booking_by_code(&self, code: &str) -> Result<Booking, ConsultationError> {
        self.state.read(|state| {
            state
                .bookings
                .values()
                .find(|b| b.code == code)
                .cloned()
                .ok_or(ConsultationError::BookingNotFound)
        })
    }

    /// A patient's bookings, most recent first.
    pub fn bookings_for_patient(&self, patient_id: Uuid) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.state.read(|state| {
            state
                .bookings
                .values()
                .filter(|b| b.patient_id == patient_id)
                .cloned()
                .collect()
        });
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        bookings
    }

    pub fn active_bookings_for_slot(&self, slot_id: Uuid) -> Vec<Booking> {
        self.state.read(|state| {
            state
                .bookings
                .values()
                .filter(|b| b.slot_id == slot_id && b.is_active())
                .cloned()
                .collect()
        })
    }

    // ==========================================================================
    // BOOKING TRANSITIONS
    // ==========================================================================

    /// Apply a transition to a booking. The closure sees the booking and its
    /// slot and runs inside the store's critical section.
    pub fn transition_booking(
        &self,
        booking_id: Uuid,
        f: impl FnOnce(&mut Booking, &ConsultationSlot) -> Result<(), ConsultationError>,
    ) -> Result<Booking, ConsultationError> {
        self.state.write(|state| {
            let slot_id = state
                .bookings
                .get(&booking_id)
                .map(|b| b.slot_id)
                .ok_or(ConsultationError::BookingNotFound)?;
            let slot = state
                .slots
                .get(&slot_id)
                .cloned()
                .ok_or(ConsultationError::SlotNotFound)?;
            let booking = state
                .bookings
                .get_mut(&booking_id)
                .ok_or(ConsultationError::BookingNotFound)?;
            f(booking, &slot)?;
            Ok(booking.clone())
        })
    }

    /// First half of a patient-driven cancellation: revalidate owner and
    /// status and move the booking to `cancelled`, keeping its seat for now.
    /// Of several concurrent cancels only one wins the claim here, so the
    /// refund that follows runs at most once. The seat is given back by
    /// [`finish_cancellation`]; a failed refund reverts the claim with
    /// [`reopen_booking`]. Returns the booking as it was before the claim.
    ///
    /// [`finish_cancellation`]: ConsultationStore::finish_cancellation
    /// [`reopen_booking`]: ConsultationStore::reopen_booking
    pub fn claim_cancellation(
        &self,
        booking_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Booking, ConsultationError> {
        self.state.write(|state| {
            let booking = state
                .bookings
                .get_mut(&booking_id)
                .ok_or(ConsultationError::BookingNotFound)?;
            if booking.patient_id != patient_id {
                return Err(ConsultationError::NotOwner);
            }
            if !booking.can_cancel() {
                return Err(ConsultationError::CancellationInvalid(format!(
                    "booking status is {}",
                    booking.status
                )));
            }
            let claimed = booking.clone();
            booking.status = BookingStatus::Cancelled;
            Ok(claimed)
        })
    }

    /// Second half of a patient-driven cancellation: the refund has settled,
    /// release the claimed booking's seat.
    pub fn finish_cancellation(&self, booking_id: Uuid) -> Result<Booking, ConsultationError> {
        self.state.write(|state| {
            let booking = state
                .bookings
                .get(&booking_id)
                .cloned()
                .ok_or(ConsultationError::BookingNotFound)?;
            let slot = state
                .slots
                .get_mut(&booking.slot_id)
                .ok_or(ConsultationError::SlotNotFound)?;
            if slot.occupied_seats == 0 {
                return Err(ConsultationError::SeatUnderflow);
            }
            slot.occupied_seats -= 1;
            Ok(booking)
        })
    }

    /// Revert a claimed cancellation whose refund failed, restoring the
    /// status the booking had when it was claimed. The seat was never
    /// released, so no counter moves here.
    pub fn reopen_booking(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<(), ConsultationError> {
        self.state.write(|state| {
            let booking = state
                .bookings
                .get_mut(&booking_id)
                .ok_or(ConsultationError::BookingNotFound)?;
            booking.status = status;
            Ok(())
        })
    }

    /// Bulk-cancellation path: mark a booking cancelled without touching the
    /// seat counter (the slot itself is already cancelled).
    pub fn mark_booking_cancelled(&self, booking_id: Uuid) -> Result<(), ConsultationError> {
        self.state.write(|state| {
            let booking = state
                .bookings
                .get_mut(&booking_id)
                .ok_or(ConsultationError::BookingNotFound)?;
            if booking.is_active() {
                booking.status = BookingStatus::Cancelled;
            }
            Ok(())
        })
    }

    // ==========================================================================
    // SLOT LIFECYCLE
    // ==========================================================================

    /// Validate and start a slot cancellation: only an available slot under
    /// 50% occupancy can be cancelled. The slot is marked cancelled inside
    /// the critical section so no new booking can slip in while refunds run;
    /// the still-active bookings are returned for the refund fan-out.
    pub fn begin_slot_cancellation(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Booking>, ConsultationError> {
        self.state.write(|state| {
            let slot = state
                .slots
                .get_mut(&slot_id)
                .ok_or(ConsultationError::SlotNotFound)?;
            if slot.status != SlotStatus::Available {
                return Err(ConsultationError::CancellationInvalid(format!(
                    "slot status is {}",
                    slot.status
                )));
            }
            if slot.occupancy_rate() >= 0.5 {
                return Err(ConsultationError::CancellationInvalid(
                    "slot with 50% or more of its seats occupied cannot be cancelled".to_string(),
                ));
            }
            slot.status = SlotStatus::Cancelled;

            Ok(state
                .bookings
                .values()
                .filter(|b| b.slot_id == slot_id && b.is_active())
                .cloned()
                .collect())
        })
    }

    /// Completion sweep: slot goes to `completed`; attended bookings are
    /// completed, still-pending ones become no-shows, cancelled ones are
    /// untouched.
    pub fn complete_sweep(&self, slot_id: Uuid) -> Result<ConsultationSlot, ConsultationError> {
        self.state.write(|state| {
            let slot = state
                .slots
                .get_mut(&slot_id)
                .ok_or(ConsultationError::SlotNotFound)?;
            if slot.status != SlotStatus::Available {
                return Err(ConsultationError::SlotUnavailable(format!(
                    "slot status is {}",
                    slot.status
                )));
            }
            slot.status = SlotStatus::Completed;
            let completed = slot.clone();

            for booking in state.bookings.values_mut() {
                if booking.slot_id != slot_id {
                    continue;
                }
                match booking.status {
                    BookingStatus::Attended => booking.status = BookingStatus::Completed,
                    BookingStatus::Created | BookingStatus::CheckedIn => {
                        booking.status = BookingStatus::NoShow
                    }
                    _ => {}
                }
            }
            Ok(completed)
        })
    }
}
