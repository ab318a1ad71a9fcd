// libs/reschedule-cell/src/services/coordinator.rs
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::RescheduleError;
use crate::models::{FailureKind, FailureNotice, RescheduleOutcome};
use crate::services::engine::{Phase, RescheduleAttempt, RescheduleEngine, RescheduleOperation};
use crate::services::slot::format_slot_time;

pub const CONFLICT_MESSAGE: &str =
    "This time was just booked by another appointment. Choose another slot or try again.";

impl RescheduleEngine {
    /// Turn the dialog just taken out of `phase` into a save.
    ///
    /// Called under the guard that read the pending record. Without an
    /// operation or an appointment identifier the phase is left `Idle`.
    pub(crate) fn claim(
        &self,
        phase: &mut Phase,
        attempt: RescheduleAttempt,
    ) -> Option<(RescheduleAttempt, Arc<dyn RescheduleOperation>)> {
        let Some(operation) = self.collaborators.reschedule.clone() else {
            warn!("Reschedule aborted: no reschedule operation registered");
            *phase = Phase::Idle;
            return None;
        };

        if !attempt.pending().appointment.has_identifier() {
            warn!("Reschedule aborted: appointment has no identifier");
            *phase = Phase::Idle;
            return None;
        }

        *phase = Phase::Saving(attempt.clone());
        Some((attempt, operation))
    }

    /// Run a claimed attempt against the reschedule operation.
    ///
    /// The optimistic move is applied before the call is issued. On failure
    /// the move is reverted before the matching dialog is reopened, and the
    /// pending records survive for a retry.
    pub(crate) async fn execute(
        &self,
        attempt: RescheduleAttempt,
        operation: Arc<dyn RescheduleOperation>,
    ) -> RescheduleOutcome {
        let request = attempt.request();
        let appointment_id = request.appointment.id;

        info!(
            "Rescheduling appointment {} to {} {}{}",
            appointment_id,
            request.new_date,
            format_slot_time(request.new_time),
            if request.ignore_capacity == Some(true) { " (capacity override)" } else { "" }
        );

        if let Some(apply) = &self.collaborators.apply_optimistic {
            apply(appointment_id, request.new_date, request.new_time);
        }

        let result = operation
            .reschedule(
                &request.appointment,
                request.new_date,
                request.new_time,
                request.ignore_capacity,
            )
            .await;

        match result {
            Ok(()) => {
                let mut phase = self.lock();
                if phase.is_saving(appointment_id) {
                    *phase = Phase::Idle;
                }
                info!("Appointment {} rescheduled", appointment_id);
                RescheduleOutcome::Committed { appointment_id }
            }
            Err(e) => {
                let notice = self.classify_failure(appointment_id, &e);

                if let Some(notify) = &self.collaborators.notify_failure {
                    notify(&notice);
                }

                if let Some(revert) = &self.collaborators.revert_optimistic {
                    revert(appointment_id);
                }

                let mut phase = self.lock();
                if phase.is_saving(appointment_id) {
                    *phase = attempt.reopen();
                } else {
                    warn!(
                        "Saving state for {} was cleared while in flight; not reopening the dialog",
                        appointment_id
                    );
                }

                RescheduleOutcome::Reverted(notice)
            }
        }
    }

    fn classify_failure(&self, appointment_id: Uuid, e: &RescheduleError) -> FailureNotice {
        let is_conflict = match &self.collaborators.is_conflict {
            Some(predicate) => predicate(e),
            None => e.is_conflict(),
        };

        if is_conflict {
            warn!("Reschedule of {} collided with another booking: {}", appointment_id, e);
            FailureNotice {
                appointment_id,
                kind: FailureKind::Conflict,
                message: CONFLICT_MESSAGE.to_string(),
            }
        } else {
            error!("Reschedule of {} failed: {}", appointment_id, e);
            FailureNotice {
                appointment_id,
                kind: FailureKind::Other,
                message: e.to_string(),
            }
        }
    }
}
