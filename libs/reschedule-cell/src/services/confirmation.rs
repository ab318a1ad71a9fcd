// libs/reschedule-cell/src/services/confirmation.rs
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{
    CapacityEvaluation, DropDecision, PendingOverCapacity, PendingReschedule, RescheduleOutcome,
};
use crate::services::engine::{Phase, RescheduleAttempt, RescheduleEngine, RescheduleOperation};

/// Which dialog a drop opens, with the payload it holds
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Confirm(PendingReschedule),
    ConfirmOverCapacity(PendingOverCapacity),
}

pub struct ConfirmationGate;

impl ConfirmationGate {
    /// No evaluation means capacity checking is off and the drop is ordinary
    pub fn decide(pending: PendingReschedule, evaluation: Option<CapacityEvaluation>) -> GateDecision {
        match evaluation {
            Some(evaluation) if evaluation.over_capacity => {
                info!(
                    "Slot {} over capacity for appointment {} ({} of {})",
                    pending.target(),
                    pending.appointment.id,
                    evaluation.current_count,
                    evaluation.max_capacity
                );
                GateDecision::ConfirmOverCapacity(PendingOverCapacity {
                    reschedule: pending,
                    current_count: evaluation.current_count,
                    max_capacity: evaluation.max_capacity,
                })
            }
            _ => GateDecision::Confirm(pending),
        }
    }
}

impl GateDecision {
    pub fn drop_decision(&self) -> DropDecision {
        match self {
            GateDecision::Confirm(_) => DropDecision::ConfirmationRequired,
            GateDecision::ConfirmOverCapacity(over) => DropDecision::OverCapacityConfirmationRequired(
                CapacityEvaluation::new(over.current_count, over.max_capacity),
            ),
        }
    }

    pub(crate) fn into_phase(self) -> Phase {
        match self {
            GateDecision::Confirm(pending) => Phase::AwaitingConfirmation(pending),
            GateDecision::ConfirmOverCapacity(over) => Phase::AwaitingOverCapacity(over),
        }
    }
}

impl RescheduleEngine {
    /// Persist the pending move exactly as dropped
    pub async fn confirm_normal(&self) -> RescheduleOutcome {
        let claimed = {
            let mut phase = self.lock();
            match std::mem::take(&mut *phase) {
                Phase::AwaitingConfirmation(pending) => {
                    self.claim(&mut phase, RescheduleAttempt::Normal(pending))
                }
                other => {
                    *phase = other;
                    debug!("Confirm ignored: no pending reschedule");
                    return RescheduleOutcome::NothingPending;
                }
            }
        };
        self.run_claimed(claimed).await
    }

    /// Persist the pending move, asking the backend to skip its capacity limit
    pub async fn confirm_over_capacity(&self) -> RescheduleOutcome {
        let claimed = {
            let mut phase = self.lock();
            match std::mem::take(&mut *phase) {
                Phase::AwaitingOverCapacity(over) => {
                    self.claim(&mut phase, RescheduleAttempt::OverCapacity(over))
                }
                other => {
                    *phase = other;
                    debug!("Over-capacity confirm ignored: no pending override");
                    return RescheduleOutcome::NothingPending;
                }
            }
        };
        self.run_claimed(claimed).await
    }

    async fn run_claimed(
        &self,
        claimed: Option<(RescheduleAttempt, Arc<dyn RescheduleOperation>)>,
    ) -> RescheduleOutcome {
        match claimed {
            Some((attempt, operation)) => self.execute(attempt, operation).await,
            None => RescheduleOutcome::Aborted,
        }
    }

    pub fn cancel_normal(&self) {
        self.cancel_pending();
    }

    pub fn cancel_over_capacity(&self) {
        self.cancel_pending();
    }

    /// Either dialog's cancel drops both pending records
    fn cancel_pending(&self) {
        let mut phase = self.lock();
        if matches!(&*phase, Phase::AwaitingConfirmation(_) | Phase::AwaitingOverCapacity(_)) {
            debug!("Pending reschedule cancelled");
            *phase = Phase::Idle;
        }
    }
}
