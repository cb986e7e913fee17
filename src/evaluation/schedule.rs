// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cron schedule parsing and overrun detection
//!
//! Supports the dialect accepted by the CronJob controller:
//! - Five fields: minute, hour, day-of-month, month, day-of-week
//! - `*`, `?`, single values, ranges (`1-5`), lists (`1,15`) and steps (`*/10`, `5/15`)
//! - Month names (`JAN`-`DEC`) and weekday names (`SUN`-`SAT`), case-insensitive
//! - Descriptors: `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`, `@hourly`
//!
//! All schedules are evaluated in UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use std::str::FromStr;
use thiserror::Error;

/// How far back to search for the previous occurrence before giving up
const LOOKBACK_DAYS: i64 = 366 * 5;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("empty schedule expression")]
    Empty,
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("unsupported descriptor '{0}'")]
    UnknownDescriptor(String),
    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("invalid step in {field} '{value}'")]
    InvalidStep { field: &'static str, value: String },
    #[error("schedule '{0}' has no occurrence in the last five years")]
    NoOccurrence(String),
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};

const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};

const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};

const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    name_base: 1,
};

// 7 is accepted as Sunday and folded onto 0 after parsing
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
    name_base: 0,
};

/// Parsed cron field as a bitmask of allowed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// Field was `*` or `?` without a step
    star: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }

    fn parse(expr: &str, spec: &FieldSpec) -> Result<Self, ScheduleError> {
        let mut bits = 0u64;
        let mut star = false;

        for part in expr.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step.parse().map_err(|_| ScheduleError::InvalidStep {
                        field: spec.name,
                        value: part.to_string(),
                    })?;
                    if step == 0 {
                        return Err(ScheduleError::InvalidStep {
                            field: spec.name,
                            value: part.to_string(),
                        });
                    }
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end, is_star) = if range == "*" || range == "?" {
                (spec.min, spec.max, true)
            } else if let Some((low, high)) = range.split_once('-') {
                (parse_value(low, spec)?, parse_value(high, spec)?, false)
            } else {
                let value = parse_value(range, spec)?;
                // "N/step" runs from N to the end of the field
                let end = if step.is_some() { spec.max } else { value };
                (value, end, false)
            };

            if start > end {
                return Err(ScheduleError::InvalidValue {
                    field: spec.name,
                    value: part.to_string(),
                });
            }

            let step = step.unwrap_or(1);
            if is_star && step == 1 {
                star = true;
            }
            for value in (start..=end).step_by(step as usize) {
                bits |= 1 << value;
            }
        }

        Ok(Self { bits, star })
    }
}

fn parse_value(raw: &str, spec: &FieldSpec) -> Result<u32, ScheduleError> {
    if let Ok(value) = raw.parse::<u32>() {
        if value < spec.min || value > spec.max {
            return Err(ScheduleError::OutOfRange {
                field: spec.name,
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        return Ok(value);
    }

    spec.names
        .iter()
        .position(|name| name.eq_ignore_ascii_case(raw))
        .map(|index| index as u32 + spec.name_base)
        .ok_or_else(|| ScheduleError::InvalidValue {
            field: spec.name,
            value: raw.to_string(),
        })
}

/// A parsed five-field cron schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let expanded = if trimmed.starts_with('@') {
            expand_descriptor(trimmed)?
        } else {
            trimmed
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let mut days_of_week = Field::parse(fields[4], &DAY_OF_WEEK)?;
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: trimmed.to_string(),
            minutes: Field::parse(fields[0], &MINUTE)?,
            hours: Field::parse(fields[1], &HOUR)?,
            days_of_month: Field::parse(fields[2], &DAY_OF_MONTH)?,
            months: Field::parse(fields[3], &MONTH)?,
            days_of_week,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Day-of-month and day-of-week are OR-ed when both are restricted,
    /// AND-ed when either one is a wildcard.
    fn matches_day(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());
        if self.days_of_month.star || self.days_of_week.star {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// Most recent scheduled time at or before `now`
    pub fn last_at_or_before(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let now = now.naive_utc();
        let mut t = now
            - TimeDelta::seconds(i64::from(now.second()))
            - TimeDelta::nanoseconds(i64::from(now.nanosecond()));
        let floor = t - TimeDelta::days(LOOKBACK_DAYS);

        while t >= floor {
            let date = t.date();
            if !self.months.contains(date.month()) {
                let first_of_month = date - TimeDelta::days(i64::from(date.day0()));
                t = first_of_month.and_time(NaiveTime::MIN) - TimeDelta::minutes(1);
                continue;
            }
            if !self.matches_day(date) {
                t = date.and_time(NaiveTime::MIN) - TimeDelta::minutes(1);
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t -= TimeDelta::minutes(i64::from(t.minute()) + 1);
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t -= TimeDelta::minutes(1);
                continue;
            }
            return Ok(t.and_utc());
        }

        Err(ScheduleError::NoOccurrence(self.expression.clone()))
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn expand_descriptor(descriptor: &str) -> Result<&'static str, ScheduleError> {
    match descriptor.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(ScheduleError::UnknownDescriptor(descriptor.to_string())),
    }
}

/// Check whether the last recorded run misses the most recent expected run.
///
/// Both times are compared at whole-second granularity; `tolerance` of zero
/// requires an exact match.
pub fn is_overrun(
    schedule: &CronSchedule,
    last_run: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance: TimeDelta,
) -> Result<bool, ScheduleError> {
    let expected = schedule.last_at_or_before(now)?;
    let last_run = last_run.with_nanosecond(0).unwrap_or(last_run);
    let drift = last_run - expected;
    Ok(drift > tolerance || drift < -tolerance)
}
