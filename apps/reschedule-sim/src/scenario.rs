// apps/reschedule-sim/src/scenario.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use reschedule_cell::{
    overbooked_appointments, Appointment, CapacitySchedule, CapacityWindow, DropDecision,
    EnginePhase, FailureKind, OptimisticStore, RescheduleCollaborators, RescheduleEngine,
    RescheduleError, RescheduleOperation, RescheduleOutcome,
};
use shared_config::SchedulingConfig;

// ==============================================================================
// SCENARIO FILE
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub capacity_windows: Vec<CapacityWindow>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedFailure {
    Conflict,
    Network,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub appointment_id: Uuid,
    /// Droppable id, e.g. `slot-2024-06-02-09:00`
    pub target: String,
    pub decision: Decision,
    #[serde(default)]
    pub fail_with: Option<ForcedFailure>,
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(raw).context("scenario is not valid JSON")?;
        if scenario.appointments.is_empty() {
            bail!("scenario has no appointments");
        }
        Ok(scenario)
    }
}

// ==============================================================================
// REPORT
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    UnknownAppointment,
    Ignored,
    Cancelled,
    Committed,
    OverCapacityCommitted,
    Conflict,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub appointment_id: Uuid,
    pub target: String,
    pub result: StepResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub appointments: Vec<Appointment>,
    pub overbooked: Vec<Uuid>,
}

// ==============================================================================
// IN-MEMORY PERSISTENCE
// ==============================================================================

/// Stands in for the backend; failures are queued per step
#[derive(Default)]
struct ScriptedBackend {
    failures: Mutex<VecDeque<Option<ForcedFailure>>>,
}

impl ScriptedBackend {
    fn queue(&self, failure: Option<ForcedFailure>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(failure);
        }
    }
}

#[async_trait]
impl RescheduleOperation for ScriptedBackend {
    async fn reschedule(
        &self,
        appointment: &Appointment,
        new_date: NaiveDate,
        new_time: NaiveTime,
        ignore_capacity: Option<bool>,
    ) -> Result<(), RescheduleError> {
        let failure = self
            .failures
            .lock()
            .map_err(|_| RescheduleError::PersistenceError("backend state poisoned".to_string()))?
            .pop_front()
            .flatten();

        debug!(
            "Backend reschedule {} -> {} {} (ignore_capacity: {:?})",
            appointment.id, new_date, new_time, ignore_capacity
        );

        match failure {
            Some(ForcedFailure::Conflict) => Err(RescheduleError::Conflict(format!(
                "slot {} {} already taken",
                new_date, new_time
            ))),
            Some(ForcedFailure::Network) => Err(RescheduleError::NetworkError(
                "connection reset by peer".to_string(),
            )),
            None => Ok(()),
        }
    }
}

// ==============================================================================
// RUNNER
// ==============================================================================

/// Give appointments stored without a usable duration the configured default
fn normalize_durations(appointments: &mut [Appointment], config: &SchedulingConfig) {
    for appointment in appointments.iter_mut() {
        if appointment.validate().is_err() {
            warn!(
                "Appointment {} has duration {}; using {} minutes",
                appointment.id, appointment.duration_minutes, config.default_duration_minutes
            );
            appointment.duration_minutes = config.default_duration_minutes as i32;
        }
    }
}

pub async fn run(scenario: Scenario, config: &SchedulingConfig) -> Result<SimulationReport> {
    let mut appointments = scenario.appointments;
    normalize_durations(&mut appointments, config);

    let schedule = Arc::new(
        CapacitySchedule::from_config(scenario.capacity_windows, config)
            .context("invalid capacity windows")?,
    );
    let store = Arc::new(OptimisticStore::new(appointments));
    let backend = Arc::new(ScriptedBackend::default());

    let engine = RescheduleEngine::with_config(
        RescheduleCollaborators::new(backend.clone())
            .with_optimistic_store(store.clone())
            .with_slot_lookup(store.clone())
            .with_capacity_rule(schedule.clone()),
        config,
    );

    let mut reports = Vec::with_capacity(scenario.steps.len());

    for step in scenario.steps {
        let report = run_step(&engine, &store, &backend, step).await;
        info!("Step for {}: {:?}", report.appointment_id, report.result);
        reports.push(report);
    }

    let appointments = store.appointments();
    let mut overbooked: Vec<Uuid> =
        overbooked_appointments(&appointments, schedule.as_ref(), &config.overbook_marker)
            .into_iter()
            .collect();
    overbooked.sort();

    Ok(SimulationReport {
        steps: reports,
        appointments,
        overbooked,
    })
}

async fn run_step(
    engine: &RescheduleEngine,
    store: &OptimisticStore,
    backend: &ScriptedBackend,
    step: Step,
) -> StepReport {
    let mut report = StepReport {
        appointment_id: step.appointment_id,
        target: step.target.clone(),
        result: StepResult::Ignored,
        message: None,
    };

    let Some(appointment) = store
        .appointments()
        .into_iter()
        .find(|apt| apt.id == step.appointment_id)
    else {
        warn!("Scenario step references unknown appointment {}", step.appointment_id);
        report.result = StepResult::UnknownAppointment;
        return report;
    };

    if !engine.start(appointment.clone()) {
        return report;
    }

    let decision = engine.end_at(Some(appointment), Some(&step.target));
    let over_capacity = match decision {
        DropDecision::Ignored(reason) => {
            debug!("Drop ignored: {:?}", reason);
            return report;
        }
        DropDecision::ConfirmationRequired => false,
        DropDecision::OverCapacityConfirmationRequired(evaluation) => {
            report.message = Some(format!(
                "{} of {} patients",
                evaluation.current_count, evaluation.max_capacity
            ));
            true
        }
    };

    if step.decision == Decision::Cancel {
        if over_capacity {
            engine.cancel_over_capacity();
        } else {
            engine.cancel_normal();
        }
        report.result = StepResult::Cancelled;
        return report;
    }

    backend.queue(step.fail_with);
    let outcome = if over_capacity {
        engine.confirm_over_capacity().await
    } else {
        engine.confirm_normal().await
    };

    match outcome {
        RescheduleOutcome::Committed { .. } => {
            store.commit();
            report.result = if over_capacity {
                StepResult::OverCapacityCommitted
            } else {
                StepResult::Committed
            };
        }
        RescheduleOutcome::Reverted(notice) => {
            report.result = match notice.kind {
                FailureKind::Conflict => StepResult::Conflict,
                FailureKind::Other => StepResult::Failed,
            };
            report.message = Some(notice.message);
            // The dialog reopened for a retry; the scenario moves on instead
            match engine.phase() {
                EnginePhase::AwaitingOverCapacity => engine.cancel_over_capacity(),
                _ => engine.cancel_normal(),
            }
        }
        RescheduleOutcome::Aborted | RescheduleOutcome::NothingPending => {}
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const A: &str = "7f1c4a8e-2b7d-4c1e-9a51-3f0e6d2b8c11";
    const B: &str = "0d9e4b7a-5c3f-4e2a-8b1d-6a7c9e0f1b23";
    const C: &str = "5a2e9c1d-8f4b-4a7e-b3c6-1d2e3f4a5b6c";

    fn scenario(steps: serde_json::Value) -> Scenario {
        let raw = serde_json::json!({
            "appointments": [
                { "id": A, "patient_id": B, "date": "2024-06-01", "time": "09:00", "duration_minutes": 60, "status": "scheduled" },
                { "id": B, "patient_id": A, "date": "2024-06-02", "time": "09:00", "duration_minutes": 60, "status": "confirmed" },
                { "id": C, "patient_id": A, "date": "2024-06-02", "time": "09:00", "duration_minutes": 0, "status": "cancelled" }
            ],
            "capacity_windows": [
                { "day_of_week": 0, "start_time": "08:00", "end_time": "12:00", "max_patients": 1 }
            ],
            "steps": steps
        });
        Scenario::from_json(&raw.to_string()).unwrap()
    }

    fn id(raw: &str) -> Uuid {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_over_capacity_override_moves_the_appointment() {
        let scenario = scenario(serde_json::json!([
            { "appointment_id": A, "target": "slot-2024-06-02-09:00", "decision": "confirm" }
        ]));

        let report = run(scenario, &SchedulingConfig::default()).await.unwrap();

        assert_eq!(report.steps[0].result, StepResult::OverCapacityCommitted);
        assert_eq!(report.steps[0].message.as_deref(), Some("2 of 1 patients"));
        let moved = report.appointments.iter().find(|apt| apt.id == id(A)).unwrap();
        assert_eq!(moved.date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(report.overbooked.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_and_cancels_leave_the_list_untouched() {
        let scenario = scenario(serde_json::json!([
            { "appointment_id": A, "target": "slot-2024-06-03-10:00", "decision": "confirm", "fail_with": "conflict" },
            { "appointment_id": A, "target": "slot-2024-06-03-10:00", "decision": "confirm", "fail_with": "network" },
            { "appointment_id": A, "target": "slot-2024-06-03-10:00", "decision": "cancel" },
            { "appointment_id": A, "target": "slot-2024-06-01-09:00", "decision": "confirm" },
            { "appointment_id": A, "target": "not-a-slot", "decision": "confirm" },
            { "appointment_id": "00000000-0000-0000-0000-000000000001", "target": "slot-2024-06-03-10:00", "decision": "confirm" }
        ]));

        let report = run(scenario, &SchedulingConfig::default()).await.unwrap();
        let results: Vec<_> = report.steps.iter().map(|step| step.result.clone()).collect();

        assert_eq!(
            results,
            vec![
                StepResult::Conflict,
                StepResult::Failed,
                StepResult::Cancelled,
                StepResult::Ignored,
                StepResult::Ignored,
                StepResult::UnknownAppointment,
            ]
        );
        assert_eq!(
            report.steps[0].message.as_deref(),
            Some(reschedule_cell::CONFLICT_MESSAGE)
        );
        let original = report.appointments.iter().find(|apt| apt.id == id(A)).unwrap();
        assert_eq!(original.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[tokio::test]
    async fn test_zero_durations_fall_back_to_the_configured_default() {
        let scenario = scenario(serde_json::json!([]));
        let config = SchedulingConfig {
            default_duration_minutes: 45,
            ..Default::default()
        };

        let report = run(scenario, &config).await.unwrap();

        let cancelled = report.appointments.iter().find(|apt| apt.id == id(C)).unwrap();
        assert_eq!(cancelled.duration_minutes, 45);
    }

    #[test]
    fn test_scenario_without_appointments_is_rejected() {
        let raw = r#"{ "appointments": [], "steps": [] }"#;
        assert_matches!(Scenario::from_json(raw), Err(_));
    }
}
