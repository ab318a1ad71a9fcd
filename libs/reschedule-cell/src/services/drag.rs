// libs/reschedule-cell/src/services/drag.rs
use tracing::{debug, warn};

use crate::models::{minutes_of_day, Appointment, DropDecision, IgnoredDrop, PendingReschedule, SlotAddress};
use crate::services::confirmation::ConfirmationGate;
use crate::services::engine::{Phase, RescheduleEngine};
use crate::services::slot::parse_slot_address;

impl RescheduleEngine {
    /// Begin dragging `appointment`.
    ///
    /// Returns false without touching state when nothing could persist the
    /// drop, when a dialog is open, or while another reschedule is saving.
    pub fn start(&self, appointment: Appointment) -> bool {
        if !self.can_reschedule() {
            debug!("Drag of {} ignored: no reschedule operation registered", appointment.id);
            return false;
        }

        let mut phase = self.lock();
        match &*phase {
            Phase::Saving(attempt) => {
                warn!(
                    "Drag of {} rejected: appointment {} is still being saved",
                    appointment.id,
                    attempt.pending().appointment.id
                );
                return false;
            }
            Phase::AwaitingConfirmation(_) | Phase::AwaitingOverCapacity(_) => {
                debug!("Drag of {} rejected: a confirmation dialog is open", appointment.id);
                return false;
            }
            Phase::Idle | Phase::Dragging { .. } => {}
        }

        debug!("Drag started for appointment {}", appointment.id);
        *phase = Phase::Dragging {
            appointment,
            drop_target: None,
        };
        true
    }

    /// Record the slot under the pointer
    pub fn over(&self, target: SlotAddress) -> bool {
        let mut phase = self.lock();
        match &mut *phase {
            Phase::Dragging { drop_target, .. } => {
                *drop_target = Some(target);
                true
            }
            _ => false,
        }
    }

    pub fn leave(&self) {
        if let Phase::Dragging { drop_target, .. } = &mut *self.lock() {
            *drop_target = None;
        }
    }

    /// Finish the drag on `target`.
    ///
    /// The drag itself always ends here; a dialog opens only for a resolvable
    /// target that differs from the appointment's current slot.
    pub fn end(&self, appointment: Option<Appointment>, target: Option<SlotAddress>) -> DropDecision {
        let dragged = {
            let mut phase = self.lock();
            match std::mem::take(&mut *phase) {
                Phase::Dragging { appointment, .. } => appointment,
                other => {
                    *phase = other;
                    return DropDecision::Ignored(IgnoredDrop::NotDragging);
                }
            }
        };

        let appointment = appointment.unwrap_or(dragged);

        if !self.can_reschedule() {
            return DropDecision::Ignored(IgnoredDrop::NoRescheduleOperation);
        }

        let Some(target) = target else {
            debug!("Drop of {} ignored: no resolvable target", appointment.id);
            return DropDecision::Ignored(IgnoredDrop::MalformedTarget);
        };

        if is_same_slot(&appointment, target) {
            debug!("Drop of {} ignored: dropped on its own slot {}", appointment.id, target);
            return DropDecision::Ignored(IgnoredDrop::SameSlot);
        }

        let evaluation = self
            .evaluator
            .as_ref()
            .map(|evaluator| evaluator.evaluate(&appointment, target));

        let decision = ConfirmationGate::decide(PendingReschedule::new(appointment, target), evaluation);
        let outcome = decision.drop_decision();
        *self.lock() = decision.into_phase();
        outcome
    }

    /// Finish the drag on a droppable id such as `slot-2024-06-02-09:00`
    pub fn end_at(&self, appointment: Option<Appointment>, droppable_id: Option<&str>) -> DropDecision {
        let target = droppable_id.and_then(parse_slot_address);
        self.end(appointment, target)
    }
}

fn is_same_slot(appointment: &Appointment, target: SlotAddress) -> bool {
    appointment.date == target.date && minutes_of_day(appointment.time) == minutes_of_day(target.time)
}
