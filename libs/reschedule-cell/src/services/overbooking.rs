// libs/reschedule-cell/src/services/overbooking.rs
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::models::Appointment;
use crate::services::capacity::CapacityRule;

/// Ids of appointments that push their interval past capacity.
///
/// Each day is swept in (time, id) order keeping the intervals still running;
/// an appointment is overbooked when it would be one more than the capacity of
/// its own interval, when the backend flagged it, or when its notes carry `marker`.
pub fn overbooked_appointments(
    appointments: &[Appointment],
    rule: &dyn CapacityRule,
    marker: &str,
) -> HashSet<Uuid> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&Appointment>> = BTreeMap::new();
    for appointment in appointments.iter().filter(|apt| apt.occupies_slot()) {
        by_date.entry(appointment.date).or_default().push(appointment);
    }

    let mut overbooked = HashSet::new();

    for (date, mut day) in by_date {
        day.sort_by(|a, b| {
            a.start_minutes()
                .cmp(&b.start_minutes())
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut running: Vec<u32> = Vec::new();

        for appointment in day {
            let start = appointment.start_minutes();
            running.retain(|&end| end > start);

            let capacity = rule.capacity_for_interval(
                date.weekday(),
                appointment.time,
                appointment.effective_duration(),
            );

            if appointment.is_marked_overbooked(marker) || running.len() as u32 + 1 > capacity {
                debug!("Appointment {} on {} exceeds capacity {}", appointment.id, date, capacity);
                overbooked.insert(appointment.id);
            }

            running.push(appointment.end_minutes());
        }
    }

    overbooked
}
