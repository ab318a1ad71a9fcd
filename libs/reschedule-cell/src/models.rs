// libs/reschedule-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RescheduleError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    #[serde(default)]
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub provider_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Set by the backend when the booking was accepted past capacity
    #[serde(default, alias = "isOverbooked")]
    pub is_overbooked: bool,
}

impl Appointment {
    /// The nil UUID stands for an appointment that was never persisted
    pub fn has_identifier(&self) -> bool {
        !self.id.is_nil()
    }

    pub fn validate(&self) -> Result<(), RescheduleError> {
        if self.duration_minutes <= 0 {
            return Err(RescheduleError::ValidationError(format!(
                "appointment {} has non-positive duration {}",
                self.id, self.duration_minutes
            )));
        }
        Ok(())
    }

    /// Duration clamped to at least one minute
    pub fn effective_duration(&self) -> u32 {
        self.duration_minutes.max(1) as u32
    }

    pub fn slot(&self) -> SlotAddress {
        SlotAddress::new(self.date, self.time)
    }

    pub fn start_minutes(&self) -> u32 {
        minutes_of_day(self.time)
    }

    pub fn end_minutes(&self) -> u32 {
        self.start_minutes() + self.effective_duration()
    }

    /// Whether this appointment still consumes a provider's time slot
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }

    /// Explicit flag or overbook marker in the notes
    pub fn is_marked_overbooked(&self, marker: &str) -> bool {
        self.is_overbooked
            || self
                .notes
                .as_deref()
                .map(|notes| notes.contains(marker))
                .unwrap_or(false)
    }
}

pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Appointment status as stored by the clinic. Values outside the known
/// vocabulary are kept verbatim and treated as occupying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Awaiting,
    Waiting,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
    Other(String),
}

impl AppointmentStatus {
    /// Cancelled, no-show and rescheduled appointments free their slot
    pub fn occupies_slot(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow | AppointmentStatus::Rescheduled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Awaiting => write!(f, "awaiting"),
            AppointmentStatus::Waiting => write!(f, "waiting"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let status = match normalized.as_str() {
            "scheduled" | "agendado" => AppointmentStatus::Scheduled,
            "confirmed" | "confirmado" => AppointmentStatus::Confirmed,
            "awaiting" | "aguardando_confirmacao" => AppointmentStatus::Awaiting,
            "waiting" | "em_espera" => AppointmentStatus::Waiting,
            "in_progress" | "em_andamento" | "em_atendimento" => AppointmentStatus::InProgress,
            "completed" | "concluido" | "realizado" | "atendido" => AppointmentStatus::Completed,
            "cancelled" | "canceled" | "cancelado" => AppointmentStatus::Cancelled,
            "no_show" | "noshow" | "no_show_confirmed" | "nao_compareceu" | "falta" | "faltou"
            | "paciente_faltou" => AppointmentStatus::NoShow,
            "rescheduled" | "rescheduled_by_patient" | "remarcado" | "remarcado_pelo_paciente"
            | "reagendado" => AppointmentStatus::Rescheduled,
            _ => AppointmentStatus::Other(raw.trim().to_string()),
        };
        Ok(status)
    }
}

impl From<String> for AppointmentStatus {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        status.to_string()
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// A (date, time-of-day) cell of the scheduling grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotAddress {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

impl SlotAddress {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

/// Weekly capacity window as configured per clinic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityWindow {
    /// 0 = Sunday through 6 = Saturday
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub max_patients: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityEvaluation {
    pub current_count: u32,
    pub max_capacity: u32,
    pub over_capacity: bool,
}

impl CapacityEvaluation {
    pub fn new(current_count: u32, max_capacity: u32) -> Self {
        Self {
            current_count,
            max_capacity,
            over_capacity: current_count > max_capacity,
        }
    }
}

// ==============================================================================
// DRAG & CONFIRMATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingReschedule {
    pub appointment: Appointment,
    pub new_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub new_time: NaiveTime,
    pub ignore_capacity: Option<bool>,
}

impl PendingReschedule {
    pub fn new(appointment: Appointment, target: SlotAddress) -> Self {
        Self {
            appointment,
            new_date: target.date,
            new_time: target.time,
            ignore_capacity: None,
        }
    }

    pub fn target(&self) -> SlotAddress {
        SlotAddress::new(self.new_date, self.new_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOverCapacity {
    #[serde(flatten)]
    pub reschedule: PendingReschedule,
    pub current_count: u32,
    pub max_capacity: u32,
}

/// Snapshot handed to the grid while rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragState {
    pub appointment: Option<Appointment>,
    pub is_dragging: bool,
    pub saving_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredDrop {
    /// No drag in progress, or the engine is busy with a dialog or a save
    NotDragging,
    NoRescheduleOperation,
    MalformedTarget,
    SameSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropDecision {
    Ignored(IgnoredDrop),
    ConfirmationRequired,
    OverCapacityConfirmationRequired(CapacityEvaluation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conflict,
    Other,
}

/// What the notification layer is told after a failed reschedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNotice {
    pub appointment_id: Uuid,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RescheduleOutcome {
    Committed { appointment_id: Uuid },
    Reverted(FailureNotice),
    /// Pending record had no appointment identifier
    Aborted,
    NothingPending,
}

// ==============================================================================
// SERDE HELPERS
// ==============================================================================

pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::services::slot::normalize_slot_time;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize_slot_time(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time of day: {}", raw)))
    }
}
