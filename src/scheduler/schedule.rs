//! Fixed-period schedules written as `every <n> <unit>`.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::SchedulerError;

/// Longest accepted period: one year.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    expression: String,
    #[serde(skip)]
    period: Duration,
}

impl Schedule {
    /// Parses `every 24 hours`, `every 1 hours`, `every 30 minutes`,
    /// `every day`, `every hour` and the like. Units may be singular or plural.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let invalid = || SchedulerError::InvalidSchedule(expression.to_string());

        let normalized = expression.trim().to_ascii_lowercase();
        let mut parts = normalized.split_whitespace();
        if parts.next() != Some("every") {
            return Err(invalid());
        }

        let (count, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(count), Some(unit), None) => (count.parse::<u64>().map_err(|_| invalid())?, unit),
            _ => return Err(invalid()),
        };
        if count == 0 {
            return Err(invalid());
        }

        let unit_secs = match unit {
            "second" | "seconds" => 1,
            "minute" | "minutes" | "mins" => 60,
            "hour" | "hours" => 60 * 60,
            "day" | "days" => 24 * 60 * 60,
            _ => return Err(invalid()),
        };

        let secs = count.checked_mul(unit_secs).ok_or_else(invalid)?;
        if secs > MAX_PERIOD.as_secs() {
            return Err(invalid());
        }

        Ok(Self {
            expression: expression.trim().to_string(),
            period: Duration::from_secs(secs),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
