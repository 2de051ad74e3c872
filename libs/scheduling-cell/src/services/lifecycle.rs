use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentStatus, SchedulingError};

/// What a validated transition request should do to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Apply,
    /// Duplicate no-show triggers on an already-terminal appointment are
    /// tolerated without touching the record.
    NoOp,
}

pub struct LifecycleService;

impl LifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All valid next statuses for a given current status. Terminal statuses
    /// admit none.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Validate a requested status change. The no-show trigger arrives from
    /// an external scheduler and may be delivered more than once, so
    /// re-triggering it against a terminal record is a no-op rather than an
    /// error.
    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        requested: &AppointmentStatus,
    ) -> Result<TransitionOutcome, SchedulingError> {
        debug!("Validating status transition {} -> {}", current, requested);

        if *requested == AppointmentStatus::NoShow && current.is_terminal() {
            debug!("Duplicate no-show trigger on terminal appointment, ignoring");
            return Ok(TransitionOutcome::NoOp);
        }

        if self.valid_transitions(current).contains(requested) {
            Ok(TransitionOutcome::Apply)
        } else {
            warn!("Invalid status transition attempted: {} -> {}", current, requested);
            Err(SchedulingError::InvalidTransition(*current))
        }
    }

    /// Which roles may trigger a given target status.
    pub fn role_may_trigger(&self, role: &str, requested: &AppointmentStatus) -> bool {
        match requested {
            AppointmentStatus::Confirmed
            | AppointmentStatus::Completed
            | AppointmentStatus::NoShow => matches!(role, "doctor" | "nurse" | "admin"),
            AppointmentStatus::Cancelled => {
                matches!(role, "patient" | "doctor" | "nurse" | "admin")
            }
            // Records are created in pending; nothing transitions back into it.
            AppointmentStatus::Pending => false,
        }
    }

    /// Soft timing check for completion: completing before the scheduled
    /// start is suspicious but not rejected at the data layer.
    pub fn warn_if_completed_early(&self, appointment: &Appointment, now: NaiveDateTime) {
        if now < appointment.scheduled_start() {
            warn!(
                "Appointment {} completed before its scheduled start ({})",
                appointment.id,
                appointment.scheduled_start()
            );
        }
    }
}

impl Default for LifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn lifecycle() -> LifecycleService {
        LifecycleService::new()
    }

    #[test]
    fn pending_can_be_confirmed_or_cancelled() {
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Pending, &AppointmentStatus::Confirmed),
            Ok(TransitionOutcome::Apply)
        );
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Pending, &AppointmentStatus::Cancelled),
            Ok(TransitionOutcome::Apply)
        );
    }

    #[test]
    fn pending_cannot_be_completed_directly() {
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Pending, &AppointmentStatus::Completed),
            Err(SchedulingError::InvalidTransition(AppointmentStatus::Pending))
        );
    }

    #[test]
    fn confirmed_supports_completion_cancellation_and_no_show() {
        for target in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_matches!(
                lifecycle().validate_transition(&AppointmentStatus::Confirmed, &target),
                Ok(TransitionOutcome::Apply)
            );
        }
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(lifecycle().valid_transitions(&terminal).is_empty());
            assert_matches!(
                lifecycle().validate_transition(&terminal, &AppointmentStatus::Confirmed),
                Err(SchedulingError::InvalidTransition(_))
            );
        }
    }

    #[test]
    fn cancelled_cannot_be_confirmed() {
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Cancelled, &AppointmentStatus::Confirmed),
            Err(SchedulingError::InvalidTransition(AppointmentStatus::Cancelled))
        );
    }

    #[test]
    fn duplicate_no_show_is_a_no_op() {
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::NoShow, &AppointmentStatus::NoShow),
            Ok(TransitionOutcome::NoOp)
        );
        // Tolerated for any terminal record, not just no-show itself.
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Completed, &AppointmentStatus::NoShow),
            Ok(TransitionOutcome::NoOp)
        );
    }

    #[test]
    fn nothing_transitions_back_to_pending() {
        assert_matches!(
            lifecycle().validate_transition(&AppointmentStatus::Confirmed, &AppointmentStatus::Pending),
            Err(SchedulingError::InvalidTransition(_))
        );
        assert!(!lifecycle().role_may_trigger("admin", &AppointmentStatus::Pending));
    }

    #[test]
    fn role_guards() {
        let lifecycle = lifecycle();
        assert!(lifecycle.role_may_trigger("doctor", &AppointmentStatus::Confirmed));
        assert!(lifecycle.role_may_trigger("nurse", &AppointmentStatus::Confirmed));
        assert!(!lifecycle.role_may_trigger("patient", &AppointmentStatus::Confirmed));

        assert!(lifecycle.role_may_trigger("patient", &AppointmentStatus::Cancelled));
        assert!(lifecycle.role_may_trigger("doctor", &AppointmentStatus::Cancelled));

        assert!(!lifecycle.role_may_trigger("patient", &AppointmentStatus::Completed));
        assert!(!lifecycle.role_may_trigger("patient", &AppointmentStatus::NoShow));
        assert!(lifecycle.role_may_trigger("admin", &AppointmentStatus::NoShow));
    }
}
