// libs/reschedule-cell/src/services/capacity.rs
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;

use crate::error::RescheduleError;
use crate::models::{minutes_of_day, Appointment, CapacityEvaluation, CapacityWindow, SlotAddress};

/// Read-only lookup of the appointments sitting in a grid slot
pub trait SlotLookup: Send + Sync {
    fn occupants(&self, date: NaiveDate, time: NaiveTime) -> Vec<Appointment>;
}

/// Maximum simultaneous patients for an interval on a given weekday
pub trait CapacityRule: Send + Sync {
    fn capacity_for_interval(&self, weekday: Weekday, start: NaiveTime, duration_minutes: u32) -> u32;
}

impl<F> SlotLookup for F
where
    F: Fn(NaiveDate, NaiveTime) -> Vec<Appointment> + Send + Sync,
{
    fn occupants(&self, date: NaiveDate, time: NaiveTime) -> Vec<Appointment> {
        self(date, time)
    }
}

impl<F> CapacityRule for F
where
    F: Fn(Weekday, NaiveTime, u32) -> u32 + Send + Sync,
{
    fn capacity_for_interval(&self, weekday: Weekday, start: NaiveTime, duration_minutes: u32) -> u32 {
        self(weekday, start, duration_minutes)
    }
}

// ==============================================================================
// EVALUATOR
// ==============================================================================

pub struct CapacityEvaluator {
    lookup: Arc<dyn SlotLookup>,
    rule: Arc<dyn CapacityRule>,
}

impl CapacityEvaluator {
    pub fn new(lookup: Arc<dyn SlotLookup>, rule: Arc<dyn CapacityRule>) -> Self {
        Self { lookup, rule }
    }

    /// Occupancy of `target` if `appointment` were moved there.
    ///
    /// The moved appointment never counts among the existing occupants and is
    /// then added back as one.
    pub fn evaluate(&self, appointment: &Appointment, target: SlotAddress) -> CapacityEvaluation {
        let occupants = self.lookup.occupants(target.date, target.time);
        let existing = count_occupying(&occupants, appointment.id);
        let duration = appointment.effective_duration();
        let max_capacity = self
            .rule
            .capacity_for_interval(target.date.weekday(), target.time, duration);

        let evaluation = CapacityEvaluation::new(existing + 1, max_capacity);

        debug!(
            "Capacity for {} ({} min): {} of {} (over: {})",
            target, duration, evaluation.current_count, evaluation.max_capacity, evaluation.over_capacity
        );

        evaluation
    }
}

/// Count occupants that still hold a provider's time, skipping `excluding`
pub fn count_occupying(occupants: &[Appointment], excluding: Uuid) -> u32 {
    occupants
        .iter()
        .filter(|apt| apt.id != excluding)
        .filter(|apt| apt.occupies_slot())
        .count() as u32
}

// ==============================================================================
// WEEKLY CAPACITY SCHEDULE
// ==============================================================================

#[derive(Debug, Clone)]
pub struct CapacitySchedule {
    windows: Vec<CapacityWindow>,
    default_capacity: u32,
}

impl CapacitySchedule {
    pub fn new(windows: Vec<CapacityWindow>, default_capacity: u32) -> Result<Self, RescheduleError> {
        for window in &windows {
            if window.day_of_week > 6 {
                return Err(RescheduleError::ValidationError(format!(
                    "day_of_week must be 0-6, got {}",
                    window.day_of_week
                )));
            }
            if window.end_time <= window.start_time {
                return Err(RescheduleError::ValidationError(format!(
                    "capacity window {}-{} ends before it starts",
                    window.start_time, window.end_time
                )));
            }
        }

        if default_capacity == 0 {
            warn!("Capacity schedule created with a default capacity of 0; every uncovered slot is full");
        }

        Ok(Self { windows, default_capacity })
    }

    pub fn from_config(windows: Vec<CapacityWindow>, config: &SchedulingConfig) -> Result<Self, RescheduleError> {
        Self::new(windows, config.default_slot_capacity)
    }

    pub fn windows(&self) -> &[CapacityWindow] {
        &self.windows
    }

    pub fn default_capacity(&self) -> u32 {
        self.default_capacity
    }
}

impl CapacityRule for CapacitySchedule {
    /// Tightest window overlapping `[start, start + duration)`
    fn capacity_for_interval(&self, weekday: Weekday, start: NaiveTime, duration_minutes: u32) -> u32 {
        let day = weekday.num_days_from_sunday() as u8;
        let interval_start = minutes_of_day(start);
        let interval_end = interval_start + duration_minutes.max(1);

        self.windows
            .iter()
            .filter(|window| window.day_of_week == day)
            .filter(|window| {
                minutes_of_day(window.start_time) < interval_end
                    && interval_start < minutes_of_day(window.end_time)
            })
            .map(|window| window.max_patients)
            .min()
            .unwrap_or(self.default_capacity)
    }
}

// ==============================================================================
// SLOT INDEX
// ==============================================================================

/// Appointments bucketed by calendar day
#[derive(Debug, Clone, Default)]
pub struct SlotIndex {
    by_date: HashMap<NaiveDate, Vec<Appointment>>,
}

impl SlotIndex {
    pub fn new(appointments: impl IntoIterator<Item = Appointment>) -> Self {
        let mut by_date: HashMap<NaiveDate, Vec<Appointment>> = HashMap::new();
        for appointment in appointments {
            by_date.entry(appointment.date).or_default().push(appointment);
        }
        Self { by_date }
    }

    pub fn appointments_on(&self, date: NaiveDate) -> &[Appointment] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl SlotLookup for SlotIndex {
    /// Appointments starting at `time` or still running at `time`
    fn occupants(&self, date: NaiveDate, time: NaiveTime) -> Vec<Appointment> {
        let target = minutes_of_day(time);
        self.appointments_on(date)
            .iter()
            .filter(|apt| {
                apt.time == time || (target >= apt.start_minutes() && target < apt.end_minutes())
            })
            .cloned()
            .collect()
    }
}
