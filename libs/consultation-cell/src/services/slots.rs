use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    ConsultationError, ConsultationSlot, CreateSlotRequest, SlotSearchQuery, SlotStatus, MAX_SEATS,
};
use crate::services::settlement::SettlementService;
use crate::store::ConsultationStore;

/// Slot management: creation, search, cancellation with refund fan-out and
/// the end-of-consultation completion sweep.
#[derive(Debug, Clone)]
pub struct SlotService {
    store: ConsultationStore,
    settlement: SettlementService,
}

impl SlotService {
    pub fn new(config: &AppConfig, store: ConsultationStore) -> Self {
        Self {
            store,
            settlement: SettlementService::new(config),
        }
    }

    pub fn create_slot(
        &self,
        request: CreateSlotRequest,
    ) -> Result<ConsultationSlot, ConsultationError> {
        if request.scheduled_at <= Utc::now() {
            return Err(ConsultationError::Validation(
                "scheduled_at must be in the future".to_string(),
            ));
        }
        if request.price <= dec!(0) {
            return Err(ConsultationError::Validation(
                "price must be positive".to_string(),
            ));
        }
        if request.total_seats == 0 || request.total_seats > MAX_SEATS {
            return Err(ConsultationError::Validation(format!(
                "total_seats must be between 1 and {}",
                MAX_SEATS
            )));
        }
        let specialty = request.specialty.trim();
        let doctor_name = request.doctor_name.trim();
        if specialty.is_empty() || doctor_name.is_empty() {
            return Err(ConsultationError::Validation(
                "specialty and doctor_name are required".to_string(),
            ));
        }

        let slot = self.store.insert_slot(
            request.scheduled_at,
            specialty.to_string(),
            doctor_name.to_string(),
            request.price,
            request.total_seats,
        );
        info!(slot_code = %slot.code, specialty = %slot.specialty, "Consultation slot created");
        Ok(slot)
    }

    pub fn get_slot(&self, slot_id: Uuid) -> Result<ConsultationSlot, ConsultationError> {
        self.store.get_slot(slot_id)
    }

    /// Bookable slots: available, in the future, with a free seat. Specialty
    /// matches exactly (case-insensitive), doctor as a substring.
    pub fn search(&self, query: &SlotSearchQuery) -> Vec<ConsultationSlot> {
        let now = Utc::now();
        let mut slots: Vec<ConsultationSlot> = self
            .store
            .list_slots()
            .into_iter()
            .filter(|s| {
                s.status == SlotStatus::Available
                    && s.scheduled_at > now
                    && s.has_free_seats()
            })
            .filter(|s| match &query.specialty {
                Some(specialty) => s.specialty.eq_ignore_ascii_case(specialty.trim()),
                None => true,
            })
            .filter(|s| match &query.doctor {
                Some(doctor) => s
                    .doctor_name
                    .to_lowercase()
                    .contains(&doctor.trim().to_lowercase()),
                None => true,
            })
            .collect();
        slots.sort_by_key(|s| s.scheduled_at);
        slots
    }

    /// Available slots starting within the next 48 hours, for the check-in
    /// dashboard.
    pub fn upcoming_48h(&self) -> Vec<ConsultationSlot> {
        let now = Utc::now();
        let horizon = now + Duration::hours(48);
        let mut slots: Vec<ConsultationSlot> = self
            .store
            .list_slots()
            .into_iter()
            .filter(|s| {
                s.status == SlotStatus::Available
                    && s.scheduled_at > now
                    && s.scheduled_at <= horizon
            })
            .collect();
        slots.sort_by_key(|s| s.scheduled_at);
        slots
    }

    /// Cancel a slot that is still under half full, refunding every active
    /// booking's points.
    ///
    /// The slot is marked cancelled up front, then refunds run per booking
    /// on a best-effort basis. A failed refund is logged and skipped; the
    /// bookings are cancelled regardless so the schedule stays consistent
    /// and the missing credits can be replayed from the log.
    pub async fn cancel_slot(&self, slot_id: Uuid, token: &str) -> Result<(), ConsultationError> {
        let bookings = self.store.begin_slot_cancellation(slot_id)?;
        info!(%slot_id, affected = bookings.len(), "Consultation slot cancelled");

        for booking in bookings {
            if booking.points_used > dec!(0) {
                let reason = format!("CONSULTATION CANCELLED - booking: {}", booking.code);
                if let Err(err) = self
                    .settlement
                    .add_points(
                        booking.patient_id,
                        booking.points_used,
                        &reason,
                        "consultation_cancel_refund",
                        token,
                    )
                    .await
                {
                    warn!(
                        booking_code = %booking.code,
                        patient_id = %booking.patient_id,
                        points = %booking.points_used,
                        error = %err,
                        "Refund failed during slot cancellation"
                    );
                }
            }
            self.store.mark_booking_cancelled(booking.id)?;
        }
        Ok(())
    }

    /// Close out a finished consultation: the slot becomes `completed`,
    /// attended bookings complete and unredeemed ones become no-shows.
    pub fn complete_slot(&self, slot_id: Uuid) -> Result<ConsultationSlot, ConsultationError> {
        let slot = self.store.complete_sweep(slot_id)?;
        info!(slot_code = %slot.code, "Consultation slot completed");
        Ok(slot)
    }
}
