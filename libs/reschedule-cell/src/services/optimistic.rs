// libs/reschedule-cell/src/services/optimistic.rs
use chrono::{NaiveDate, NaiveTime};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Appointment;
use crate::services::capacity::{SlotIndex, SlotLookup};
use crate::services::engine::RescheduleCollaborators;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMove {
    pub appointment_id: Uuid,
    pub original_date: NaiveDate,
    pub original_time: NaiveTime,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

#[derive(Debug, Default)]
struct StoreState {
    base: Vec<Appointment>,
    pending: Option<OptimisticMove>,
}

/// Appointment list as the grid should show it, with at most one unconfirmed move
#[derive(Debug, Default)]
pub struct OptimisticStore {
    state: Mutex<StoreState>,
}

impl OptimisticStore {
    pub fn new(appointments: Vec<Appointment>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                base: appointments,
                pending: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show `appointment_id` at its new slot; false when the id is unknown
    pub fn apply(&self, appointment_id: Uuid, new_date: NaiveDate, new_time: NaiveTime) -> bool {
        let mut state = self.lock();
        let Some(original) = state.base.iter().find(|apt| apt.id == appointment_id) else {
            warn!("Optimistic move ignored: appointment {} not loaded", appointment_id);
            return false;
        };

        state.pending = Some(OptimisticMove {
            appointment_id,
            original_date: original.date,
            original_time: original.time,
            new_date,
            new_time,
        });
        debug!("Optimistic move applied for {}", appointment_id);
        true
    }

    pub fn revert(&self, appointment_id: Uuid) -> bool {
        let mut state = self.lock();
        match &state.pending {
            Some(pending) if pending.appointment_id == appointment_id => {
                state.pending = None;
                debug!("Optimistic move reverted for {}", appointment_id);
                true
            }
            _ => false,
        }
    }

    /// Fold the pending move into the base list once the backend accepted it
    pub fn commit(&self) -> Option<OptimisticMove> {
        let mut state = self.lock();
        let pending = state.pending.take()?;
        if let Some(apt) = state.base.iter_mut().find(|apt| apt.id == pending.appointment_id) {
            apt.date = pending.new_date;
            apt.time = pending.new_time;
        }
        Some(pending)
    }

    /// Fresh data from the store supersedes any overlay
    pub fn replace(&self, appointments: Vec<Appointment>) {
        let mut state = self.lock();
        state.base = appointments;
        state.pending = None;
    }

    pub fn pending(&self) -> Option<OptimisticMove> {
        self.lock().pending.clone()
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        let state = self.lock();
        state
            .base
            .iter()
            .map(|apt| match &state.pending {
                Some(pending) if pending.appointment_id == apt.id => Appointment {
                    date: pending.new_date,
                    time: pending.new_time,
                    ..apt.clone()
                },
                _ => apt.clone(),
            })
            .collect()
    }
}

impl SlotLookup for OptimisticStore {
    fn occupants(&self, date: NaiveDate, time: NaiveTime) -> Vec<Appointment> {
        SlotIndex::new(self.appointments()).occupants(date, time)
    }
}

impl RescheduleCollaborators {
    /// Route optimistic apply/revert through `store`
    pub fn with_optimistic_store(self, store: Arc<OptimisticStore>) -> Self {
        let apply_store = store.clone();
        self.with_optimistic_apply(Arc::new(move |id: Uuid, date: NaiveDate, time: NaiveTime| {
            apply_store.apply(id, date, time);
        }))
        .with_optimistic_revert(Arc::new(move |id: Uuid| {
            store.revert(id);
        }))
    }
}
