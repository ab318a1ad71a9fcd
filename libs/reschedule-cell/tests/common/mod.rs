// libs/reschedule-cell/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};
use mockall::mock;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use reschedule_cell::*;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

mock! {
    pub Persistence {}

    #[async_trait]
    impl RescheduleOperation for Persistence {
        async fn reschedule(
            &self,
            appointment: &Appointment,
            new_date: NaiveDate,
            new_time: NaiveTime,
            ignore_capacity: Option<bool>,
        ) -> Result<(), RescheduleError>;
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn appointment(on: NaiveDate, at: NaiveTime, duration_minutes: i32, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        provider_id: Some(Uuid::new_v4()),
        date: on,
        time: at,
        duration_minutes,
        status,
        notes: None,
        is_overbooked: false,
    }
}

/// Appointment `A` from the reference scenario: 2024-06-01 09:00, 60 minutes
pub fn appointment_a() -> Appointment {
    appointment(date(2024, 6, 1), time(9, 0), 60, AppointmentStatus::Scheduled)
}

/// Occupants of 2024-06-02 09:00 with `active` scheduled/completed entries
/// plus a cancelled and a no-show entry that must not count
pub fn occupants(active: usize) -> Vec<Appointment> {
    let on = date(2024, 6, 2);
    let mut list = Vec::new();
    for i in 0..active {
        let status = if i % 2 == 0 { AppointmentStatus::Scheduled } else { AppointmentStatus::Completed };
        list.push(appointment(on, time(9, 0), 60, status));
    }
    list.push(appointment(on, time(9, 0), 60, AppointmentStatus::Cancelled));
    list.push(appointment(on, time(9, 0), 60, AppointmentStatus::NoShow));
    list
}

pub fn fixed_capacity(max: u32) -> Arc<dyn CapacityRule> {
    Arc::new(move |_day: Weekday, _start: NaiveTime, _duration: u32| max)
}

pub fn fixed_occupants(list: Vec<Appointment>) -> Arc<dyn SlotLookup> {
    Arc::new(move |_date: NaiveDate, _time: NaiveTime| list.clone())
}

/// Ordered log of collaborator calls, shared between closures and mocks
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|entry| entry.starts_with(prefix)).count()
    }
}

/// Wire apply/revert closures that record into `log`
pub fn with_recorded_optimism(collaborators: RescheduleCollaborators, log: &CallLog) -> RescheduleCollaborators {
    let apply_log = log.clone();
    let revert_log = log.clone();
    collaborators
        .with_optimistic_apply(Arc::new(move |id: Uuid, new_date: NaiveDate, new_time: NaiveTime| {
            apply_log.push(format!("apply {} {} {}", id, new_date, new_time.format("%H:%M")));
        }))
        .with_optimistic_revert(Arc::new(move |id: Uuid| {
            revert_log.push(format!("revert {}", id));
        }))
}

/// Reschedule operation that blocks until released, for observing in-flight state
pub struct GatedOperation {
    pub gate: Arc<Notify>,
    pub outcome: Result<(), RescheduleError>,
    pub log: CallLog,
}

impl GatedOperation {
    pub fn new(outcome: Result<(), RescheduleError>, log: CallLog) -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            outcome,
            log,
        }
    }
}

#[async_trait]
impl RescheduleOperation for GatedOperation {
    async fn reschedule(
        &self,
        appointment: &Appointment,
        _new_date: NaiveDate,
        _new_time: NaiveTime,
        _ignore_capacity: Option<bool>,
    ) -> Result<(), RescheduleError> {
        self.log.push(format!("reschedule {}", appointment.id));
        self.gate.notified().await;
        self.outcome.clone()
    }
}

/// Drag `appointment` onto `target` and return the drop decision
pub fn drag_and_drop(engine: &RescheduleEngine, appointment: &Appointment, target: &str) -> DropDecision {
    assert!(engine.start(appointment.clone()), "drag should start");
    engine.end_at(Some(appointment.clone()), Some(target))
}

/// At most one confirmation dialog can be open at any time
pub fn assert_single_dialog(engine: &RescheduleEngine) {
    assert!(
        !(engine.is_confirm_dialog_open() && engine.is_over_capacity_dialog_open()),
        "both dialogs open at once"
    );
}
