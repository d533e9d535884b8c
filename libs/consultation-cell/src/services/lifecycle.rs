//! Booking state machine. Every status change funnels through
//! [`validate_transition`] so the set of legal moves lives in one place.

use chrono::{DateTime, Duration, Utc};

use crate::models::{BookingStatus, ConsultationError, CHECKIN_WINDOW_HOURS};

/// Statuses a booking may move to from `from`. Terminal statuses have no
/// successors.
pub fn valid_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    match from {
        BookingStatus::Created => &[
            BookingStatus::CheckedIn,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ],
        BookingStatus::CheckedIn => &[
            BookingStatus::Attended,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ],
        BookingStatus::Attended => &[BookingStatus::Completed],
        BookingStatus::NoShow | BookingStatus::Completed | BookingStatus::Cancelled => &[],
    }
}

pub fn validate_transition(
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), ConsultationError> {
    if valid_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ConsultationError::Validation(format!(
            "cannot move booking from {} to {}",
            from, to
        )))
    }
}

/// Check-in is accepted from 48 hours before the slot up to (not including)
/// the slot time itself.
pub fn check_in_window(
    slot_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ConsultationError> {
    let opens_at = slot_time - Duration::hours(CHECKIN_WINDOW_HOURS);
    if now < opens_at {
        return Err(ConsultationError::CheckinInvalid(format!(
            "check-in opens at {}",
            opens_at
        )));
    }
    if now >= slot_time {
        return Err(ConsultationError::CheckinInvalid(
            "consultation has already started".to_string(),
        ));
    }
    Ok(())
}
