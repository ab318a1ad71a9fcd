// libs/reschedule-cell/src/services/engine.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use shared_config::SchedulingConfig;

use crate::error::RescheduleError;
use crate::models::{
    Appointment, DragState, FailureNotice, PendingOverCapacity, PendingReschedule, SlotAddress,
};
use crate::services::capacity::{CapacityEvaluator, CapacityRule, SlotLookup};

// ==============================================================================
// COLLABORATORS
// ==============================================================================

/// Durable mutation behind a confirmed drop
#[async_trait]
pub trait RescheduleOperation: Send + Sync {
    async fn reschedule(
        &self,
        appointment: &Appointment,
        new_date: NaiveDate,
        new_time: NaiveTime,
        ignore_capacity: Option<bool>,
    ) -> Result<(), RescheduleError>;
}

pub type OptimisticApplyFn = Arc<dyn Fn(Uuid, NaiveDate, NaiveTime) + Send + Sync>;
pub type OptimisticRevertFn = Arc<dyn Fn(Uuid) + Send + Sync>;
pub type ConflictPredicate = Arc<dyn Fn(&RescheduleError) -> bool + Send + Sync>;
pub type FailureNotifier = Arc<dyn Fn(&FailureNotice) + Send + Sync>;

/// Everything the engine borrows from its host.
///
/// Without a reschedule operation dragging is disabled. Capacity checks run
/// only when both the slot lookup and the capacity rule are present.
#[derive(Clone, Default)]
pub struct RescheduleCollaborators {
    pub reschedule: Option<Arc<dyn RescheduleOperation>>,
    pub apply_optimistic: Option<OptimisticApplyFn>,
    pub revert_optimistic: Option<OptimisticRevertFn>,
    pub slot_lookup: Option<Arc<dyn SlotLookup>>,
    pub capacity_rule: Option<Arc<dyn CapacityRule>>,
    pub is_conflict: Option<ConflictPredicate>,
    pub notify_failure: Option<FailureNotifier>,
}

impl RescheduleCollaborators {
    pub fn new(reschedule: Arc<dyn RescheduleOperation>) -> Self {
        Self {
            reschedule: Some(reschedule),
            ..Self::default()
        }
    }

    pub fn with_optimistic_apply(mut self, apply: OptimisticApplyFn) -> Self {
        self.apply_optimistic = Some(apply);
        self
    }

    pub fn with_optimistic_revert(mut self, revert: OptimisticRevertFn) -> Self {
        self.revert_optimistic = Some(revert);
        self
    }

    pub fn with_slot_lookup(mut self, lookup: Arc<dyn SlotLookup>) -> Self {
        self.slot_lookup = Some(lookup);
        self
    }

    pub fn with_capacity_rule(mut self, rule: Arc<dyn CapacityRule>) -> Self {
        self.capacity_rule = Some(rule);
        self
    }

    pub fn with_conflict_predicate(mut self, predicate: ConflictPredicate) -> Self {
        self.is_conflict = Some(predicate);
        self
    }

    pub fn with_failure_notifier(mut self, notifier: FailureNotifier) -> Self {
        self.notify_failure = Some(notifier);
        self
    }
}

// ==============================================================================
// PHASES
// ==============================================================================

/// A confirmed drop on its way to the persistence layer
#[derive(Debug, Clone, PartialEq)]
pub enum RescheduleAttempt {
    Normal(PendingReschedule),
    OverCapacity(PendingOverCapacity),
}

impl RescheduleAttempt {
    pub fn pending(&self) -> &PendingReschedule {
        match self {
            RescheduleAttempt::Normal(pending) => pending,
            RescheduleAttempt::OverCapacity(over) => &over.reschedule,
        }
    }

    /// Payload sent to the reschedule operation; overrides bypass capacity
    pub fn request(&self) -> PendingReschedule {
        match self {
            RescheduleAttempt::Normal(pending) => pending.clone(),
            RescheduleAttempt::OverCapacity(over) => PendingReschedule {
                ignore_capacity: Some(true),
                ..over.reschedule.clone()
            },
        }
    }

    pub(crate) fn reopen(self) -> Phase {
        match self {
            RescheduleAttempt::Normal(pending) => Phase::AwaitingConfirmation(pending),
            RescheduleAttempt::OverCapacity(over) => Phase::AwaitingOverCapacity(over),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Dragging,
    AwaitingConfirmation,
    AwaitingOverCapacity,
    Saving,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Phase {
    #[default]
    Idle,
    Dragging {
        appointment: Appointment,
        drop_target: Option<SlotAddress>,
    },
    AwaitingConfirmation(PendingReschedule),
    AwaitingOverCapacity(PendingOverCapacity),
    Saving(RescheduleAttempt),
}

impl Phase {
    pub(crate) fn is_saving(&self, appointment_id: Uuid) -> bool {
        matches!(self, Phase::Saving(attempt) if attempt.pending().appointment.id == appointment_id)
    }
}

// ==============================================================================
// ENGINE
// ==============================================================================

pub struct RescheduleEngine {
    pub(crate) collaborators: RescheduleCollaborators,
    pub(crate) evaluator: Option<CapacityEvaluator>,
    state: Mutex<Phase>,
}

impl RescheduleEngine {
    pub fn new(collaborators: RescheduleCollaborators) -> Self {
        let evaluator = match (&collaborators.slot_lookup, &collaborators.capacity_rule) {
            (Some(lookup), Some(rule)) => Some(CapacityEvaluator::new(lookup.clone(), rule.clone())),
            _ => {
                debug!("Capacity checks disabled: slot lookup or capacity rule missing");
                None
            }
        };

        Self {
            collaborators,
            evaluator,
            state: Mutex::new(Phase::Idle),
        }
    }

    pub fn with_config(collaborators: RescheduleCollaborators, config: &SchedulingConfig) -> Self {
        let mut engine = Self::new(collaborators);
        if !config.capacity_checks_enabled {
            debug!("Capacity checks disabled by configuration");
            engine.evaluator = None;
        }
        engine
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Phase> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn can_reschedule(&self) -> bool {
        self.collaborators.reschedule.is_some()
    }

    pub fn capacity_checks_enabled(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn phase(&self) -> EnginePhase {
        match &*self.lock() {
            Phase::Idle => EnginePhase::Idle,
            Phase::Dragging { .. } => EnginePhase::Dragging,
            Phase::AwaitingConfirmation(_) => EnginePhase::AwaitingConfirmation,
            Phase::AwaitingOverCapacity(_) => EnginePhase::AwaitingOverCapacity,
            Phase::Saving(_) => EnginePhase::Saving,
        }
    }

    pub fn drag_state(&self) -> DragState {
        match &*self.lock() {
            Phase::Dragging { appointment, .. } => DragState {
                appointment: Some(appointment.clone()),
                is_dragging: true,
                saving_appointment_id: None,
            },
            Phase::Saving(attempt) => DragState {
                appointment: None,
                is_dragging: false,
                saving_appointment_id: Some(attempt.pending().appointment.id),
            },
            _ => DragState::default(),
        }
    }

    pub fn drop_target(&self) -> Option<SlotAddress> {
        match &*self.lock() {
            Phase::Dragging { drop_target, .. } => *drop_target,
            _ => None,
        }
    }

    pub fn saving_appointment_id(&self) -> Option<Uuid> {
        self.drag_state().saving_appointment_id
    }

    pub fn is_confirm_dialog_open(&self) -> bool {
        matches!(&*self.lock(), Phase::AwaitingConfirmation(_))
    }

    pub fn is_over_capacity_dialog_open(&self) -> bool {
        matches!(&*self.lock(), Phase::AwaitingOverCapacity(_))
    }

    /// Kept while a save is in flight so a failed attempt can be retried
    pub fn pending_reschedule(&self) -> Option<PendingReschedule> {
        match &*self.lock() {
            Phase::AwaitingConfirmation(pending) => Some(pending.clone()),
            Phase::AwaitingOverCapacity(over) => Some(over.reschedule.clone()),
            Phase::Saving(attempt) => Some(attempt.pending().clone()),
            _ => None,
        }
    }

    pub fn pending_over_capacity(&self) -> Option<PendingOverCapacity> {
        match &*self.lock() {
            Phase::AwaitingOverCapacity(over) => Some(over.clone()),
            Phase::Saving(RescheduleAttempt::OverCapacity(over)) => Some(over.clone()),
            _ => None,
        }
    }

    /// Forget the in-flight save; a late failure will no longer reopen a dialog
    pub fn clear_saving(&self) {
        let mut phase = self.lock();
        if let Phase::Saving(attempt) = &*phase {
            debug!("Clearing saving state for appointment {}", attempt.pending().appointment.id);
            *phase = Phase::Idle;
        }
    }
}
