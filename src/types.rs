//! Core domain types shared across the scheduling pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A user-defined category label attachable to tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flair {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    /// Hex or named CSS color, stored verbatim.
    pub color: String,
}

/// Unit for a task duration. Minimum resolution is one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Minutes,
    Hours,
}

/// A semantic duration as the generator emits it ("30 minutes", "1 hour").
///
/// Kept as magnitude + unit rather than a normalized minute count so the
/// round trip through the store preserves what the generator said.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDuration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl TaskDuration {
    pub fn minutes(amount: u32) -> Self {
        Self {
            amount,
            unit: DurationUnit::Minutes,
        }
    }

    pub fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: DurationUnit::Hours,
        }
    }

    pub fn as_minutes(&self) -> i64 {
        match self.unit {
            DurationUnit::Minutes => i64::from(self.amount),
            DurationUnit::Hours => i64::from(self.amount) * 60,
        }
    }

    pub fn to_chrono(&self) -> Duration {
        Duration::minutes(self.as_minutes())
    }
}

impl fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match (self.unit, self.amount) {
            (DurationUnit::Minutes, 1) => "minute",
            (DurationUnit::Minutes, _) => "minutes",
            (DurationUnit::Hours, 1) => "hour",
            (DurationUnit::Hours, _) => "hours",
        };
        write!(f, "{} {}", self.amount, unit)
    }
}

/// Error for duration strings the parser does not recognize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized duration: {0:?}")]
pub struct ParseDurationError(pub String);

impl FromStr for TaskDuration {
    type Err = ParseDurationError;

    /// Accepts "30 minutes", "1 hour", "45 min", "2 hrs", and the compact
    /// forms "90m" / "1h". Zero durations are rejected — one minute is the
    /// minimum resolution.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let err = || ParseDurationError(s.to_string());

        let (number, unit) = match raw.split_once(char::is_whitespace) {
            Some((n, u)) => (n.trim().to_string(), u.trim().to_string()),
            None => {
                // Compact form: digits immediately followed by a unit suffix.
                let split = raw.find(|c: char| !c.is_ascii_digit()).ok_or_else(err)?;
                let (n, u) = raw.split_at(split);
                (n.to_string(), u.to_string())
            }
        };

        let amount: u32 = number.parse().map_err(|_| err())?;
        if amount == 0 {
            return Err(err());
        }

        let unit = match unit.trim_end_matches('s') {
            "minute" | "min" | "m" => DurationUnit::Minutes,
            "hour" | "hr" | "h" => DurationUnit::Hours,
            _ => return Err(err()),
        };

        Ok(TaskDuration { amount, unit })
    }
}

impl Serialize for TaskDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single timed task on a schedule.
///
/// `start_time` is always an absolute instant; never an ambiguous local time.
/// Items are never mutated in place — schedules are replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration: TaskDuration,
    /// Weak reference to a flair; the flair may have been edited or deleted
    /// since, so lookups must tolerate a miss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flair_id: Option<String>,
}

impl ScheduleItem {
    /// Exclusive end of this item's interval.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration.to_chrono()
    }

    /// Strict interval intersection; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &ScheduleItem) -> bool {
        self.start_time < other.end_time() && other.start_time < self.end_time()
    }
}

/// The complete ordered set of one owner's timed tasks.
///
/// Singleton per owner. Invariants: `items` is sorted ascending by
/// `start_time`, and no two item intervals overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub owner_id: String,
    pub items: Vec<ScheduleItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Sentinel for "no schedule generated yet" — a legitimate empty state,
    /// not an error.
    pub fn empty(owner_id: &str) -> Self {
        let now = Utc::now();
        Schedule {
            id: String::new(),
            owner_id: owner_id.to_string(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of a schedule-generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScheduleRequest {
    pub owner_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub flair_ids: Option<Vec<String>>,
}
