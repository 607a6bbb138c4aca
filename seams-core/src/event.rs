//! Event categories, review workflow and field rules.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeamsError};

/// Highest point value a single event may award.
pub const MAX_EVENT_POINTS: i32 = 1000;

/// Event category as shown to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Technical,
    Cultural,
    Sports,
    #[serde(rename = "NSS")]
    Nss,
    Entrepreneurship,
    Placement,
    #[serde(rename = "Life Skills")]
    LifeSkills,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::Technical,
        EventCategory::Cultural,
        EventCategory::Sports,
        EventCategory::Nss,
        EventCategory::Entrepreneurship,
        EventCategory::Placement,
        EventCategory::LifeSkills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Technical => "Technical",
            EventCategory::Cultural => "Cultural",
            EventCategory::Sports => "Sports",
            EventCategory::Nss => "NSS",
            EventCategory::Entrepreneurship => "Entrepreneurship",
            EventCategory::Placement => "Placement",
            EventCategory::LifeSkills => "Life Skills",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = SeamsError;

    fn from_str(s: &str) -> Result<Self> {
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SeamsError::InvalidInput(format!("unknown event category '{}'", s)))
    }
}

impl TryFrom<String> for EventCategory {
    type Error = SeamsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Completed => "completed",
        }
    }

    /// Initial status for an event created by a user of the given role.
    pub fn initial_for(role: crate::Role) -> Self {
        if role.auto_approves_events() {
            EventStatus::Approved
        } else {
            EventStatus::Pending
        }
    }

    /// Validate an admin review decision.
    ///
    /// Nothing moves back to `pending`, and `completed` is terminal.
    pub fn transition(self, next: EventStatus) -> Result<EventStatus> {
        use EventStatus::*;
        match (self, next) {
            (Pending, Approved)
            | (Pending, Rejected)
            | (Rejected, Approved)
            | (Approved, Rejected)
            | (Approved, Completed) => Ok(next),
            _ => Err(SeamsError::InvalidTransition {
                from: self,
                to: next,
            }),
        }
    }

    pub fn is_open_for_registration(&self) -> bool {
        matches!(self, EventStatus::Approved)
    }

    /// Fails with `EventNotOpen` unless students may currently sign up.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open_for_registration() {
            Ok(())
        } else {
            Err(SeamsError::EventNotOpen(*self))
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = SeamsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            "completed" => Ok(EventStatus::Completed),
            other => Err(SeamsError::InvalidInput(format!(
                "unknown event status '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = SeamsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Fields supplied when creating an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub category: EventCategory,
    pub points: i32,
    pub max_participants: Option<i32>,
    pub poster: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub coordinators: Vec<String>,
}

impl EventDraft {
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("venue", &self.venue)?;
        validate_time("time", &self.time)?;
        if let Some(end_time) = &self.end_time {
            validate_time("end_time", end_time)?;
        }
        validate_points(self.points)?;
        validate_max_participants(self.max_participants)?;
        validate_date_range(self.date, self.end_date)
    }
}

/// Partial update of an event. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub category: Option<EventCategory>,
    pub points: Option<i32>,
    pub max_participants: Option<i32>,
    pub poster: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub coordinators: Option<Vec<String>>,
}

impl EventPatch {
    /// Validates only the fields that are present. Cross-field checks that
    /// need the stored event (date range, capacity) are done by the caller.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description)?;
        }
        if let Some(venue) = &self.venue {
            require_text("venue", venue)?;
        }
        if let Some(time) = &self.time {
            validate_time("time", time)?;
        }
        if let Some(end_time) = &self.end_time {
            validate_time("end_time", end_time)?;
        }
        if let Some(points) = self.points {
            validate_points(points)?;
        }
        validate_max_participants(self.max_participants)
    }

    pub fn is_empty(&self) -> bool {
        self == &EventPatch::default()
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SeamsError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Times are 24h `HH:MM`.
pub fn validate_time(field: &str, value: &str) -> Result<()> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|_| ())
        .map_err(|_| SeamsError::InvalidInput(format!("{} must be HH:MM, got '{}'", field, value)))
}

pub fn validate_points(points: i32) -> Result<()> {
    if !(0..=MAX_EVENT_POINTS).contains(&points) {
        return Err(SeamsError::InvalidInput(format!(
            "points must be between 0 and {}",
            MAX_EVENT_POINTS
        )));
    }
    Ok(())
}

pub fn validate_max_participants(max: Option<i32>) -> Result<()> {
    match max {
        Some(m) if m < 1 => Err(SeamsError::InvalidInput(
            "max_participants must be at least 1".into(),
        )),
        _ => Ok(()),
    }
}

pub fn validate_date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    match end {
        Some(end) if end < start => Err(SeamsError::InvalidInput(
            "end_date must not be before date".into(),
        )),
        _ => Ok(()),
    }
}

/// Fails with `EventFull` when one more registration would exceed capacity.
pub fn check_capacity(registered: i32, max: Option<i32>) -> Result<()> {
    match max {
        Some(max) if registered >= max => Err(SeamsError::EventFull { max }),
        _ => Ok(()),
    }
}
