// libs/reschedule-cell/src/services/slot.rs
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::RescheduleError;
use crate::models::SlotAddress;

const SLOT_PREFIX: &str = "slot-";

static SLOT_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn slot_pattern() -> Option<&'static Regex> {
    SLOT_PATTERN
        .get_or_init(|| Regex::new(r"^slot-(\d{4}-\d{2}-\d{2})-(\d{2}:\d{2})$").ok())
        .as_ref()
}

/// Anything that can name a calendar day
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Iso(&'a str),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(value: &'a str) -> Self {
        DateInput::Iso(value)
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(value: NaiveDate) -> Self {
        DateInput::Date(value)
    }
}

impl From<NaiveDateTime> for DateInput<'_> {
    fn from(value: NaiveDateTime) -> Self {
        DateInput::DateTime(value)
    }
}

impl From<DateTime<Local>> for DateInput<'_> {
    fn from(value: DateTime<Local>) -> Self {
        DateInput::Zoned(value.fixed_offset())
    }
}

impl From<DateTime<Utc>> for DateInput<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        DateInput::Zoned(value.fixed_offset())
    }
}

/// Reduce any date representation to its calendar day.
///
/// ISO strings are read as calendar dates: for a timestamp only the
/// `YYYY-MM-DD` prefix is used, so no UTC/local conversion can shift it.
/// Zoned values are truncated in their own offset.
pub fn normalize_date<'a>(input: impl Into<DateInput<'a>>) -> Result<NaiveDate, RescheduleError> {
    match input.into() {
        DateInput::Iso(raw) => parse_calendar_date(raw),
        DateInput::Date(date) => Ok(date),
        DateInput::DateTime(datetime) => Ok(datetime.date()),
        DateInput::Zoned(datetime) => Ok(datetime.date_naive()),
    }
}

fn parse_calendar_date(raw: &str) -> Result<NaiveDate, RescheduleError> {
    let trimmed = raw.trim();
    let head = trimmed
        .get(..10)
        .ok_or_else(|| RescheduleError::InvalidDate(raw.to_string()))?;

    match trimmed[10..].chars().next() {
        None | Some('T') | Some('t') | Some(' ') => {}
        Some(_) => return Err(RescheduleError::InvalidDate(raw.to_string())),
    }

    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|_| RescheduleError::InvalidDate(raw.to_string()))
}

/// Build a local date pinned at noon.
///
/// Noon keeps the day stable under any offset conversion up to ±12h.
pub fn build_local_date(year: i32, month: u32, day: u32) -> Result<DateTime<Local>, RescheduleError> {
    Local
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .earliest()
        .ok_or_else(|| RescheduleError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day)))
}

/// Accepts `HH:mm` or `HH:mm:ss`, seconds are dropped
pub fn normalize_slot_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    let head = trimmed.get(..5).unwrap_or(trimmed);
    NaiveTime::parse_from_str(head, "%H:%M").ok()
}

pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse a droppable id of the form `slot-YYYY-MM-DD-HH:mm`
pub fn parse_slot_address(address: &str) -> Option<SlotAddress> {
    let captures = slot_pattern()?.captures(address)?;
    let date = NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(captures.get(2)?.as_str(), "%H:%M").ok()?;

    debug!("Resolved drop target {} to {} {}", address, date, format_slot_time(time));
    Some(SlotAddress::new(date, time))
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{}",
            SLOT_PREFIX,
            self.date.format("%Y-%m-%d"),
            format_slot_time(self.time)
        )
    }
}

impl FromStr for SlotAddress {
    type Err = RescheduleError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        parse_slot_address(address)
            .ok_or_else(|| RescheduleError::MalformedSlotAddress(address.to_string()))
    }
}
