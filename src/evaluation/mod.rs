// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Workload evaluation engine
//!
//! Folds a fetched collection of CronJob/Job records into a verdict:
//! - Namespace, node and name filtering (`selector`)
//! - Schedule overrun detection for CronJobs (`schedule`)
//! - Failed-status detection for Jobs (`status`)
//!
//! The engine keeps no state between runs; evaluating the same records twice
//! yields the same outcome.

pub mod schedule;
pub mod selector;
pub mod status;

pub use schedule::{CronSchedule, ScheduleError};
pub use selector::{FilterCriteria, NameFilter};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::kubernetes::{FetchError, ResourceFetcher, ResourceRecord, WorkloadKind};

/// Terminal check status, following the Nagios/Sensu plugin convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// CronJobs must have run at their most recent scheduled time
    Schedule,
    /// Jobs must not have failed
    Completion,
}

impl Mode {
    pub fn kind(self) -> WorkloadKind {
        match self {
            Mode::Schedule => WorkloadKind::CronJob,
            Mode::Completion => WorkloadKind::Job,
        }
    }

    /// Check name printed in front of the status
    pub fn check_name(self) -> &'static str {
        match self {
            Mode::Schedule => "KubeCronJobs",
            Mode::Completion => "KubeJobs",
        }
    }
}

/// Everything the engine needs to know about a run
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub criteria: FilterCriteria,
    pub names: NameFilter,
    /// Label selector pushed down to the fetch; forces the name filter to `all`
    pub label_selector: Option<String>,
    /// Allowed drift between the recorded and the expected run
    pub schedule_tolerance: TimeDelta,
    /// Severity reported when at least one workload failed
    pub failure_severity: Severity,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            names: NameFilter::all(),
            label_selector: None,
            schedule_tolerance: TimeDelta::zero(),
            failure_severity: Severity::Critical,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{resource}: invalid schedule: {source}")]
    InvalidSchedule {
        resource: String,
        #[source]
        source: ScheduleError,
    },
}

/// Result of one check run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationOutcome {
    pub severity: Severity,
    pub message: String,
    /// Names of the resources that reached the mode-specific check, in order
    pub evaluated: Vec<String>,
    /// `namespace.name` of the failed resources, in order
    pub failed: Vec<String>,
}

impl EvaluationOutcome {
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Unknown,
            message: message.into(),
            evaluated: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn from_fetch_error(err: &FetchError) -> Self {
        Self {
            severity: fetch_error_severity(err),
            message: format!("API error: {}", err),
            evaluated: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn from_evaluation_error(err: &EvaluationError) -> Self {
        Self {
            severity: evaluation_error_severity(err),
            message: format!("Check failed to run: {}", err),
            evaluated: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Severity reported for each fetch failure kind
fn fetch_error_severity(err: &FetchError) -> Severity {
    match err {
        FetchError::Client(_) | FetchError::Api(_) | FetchError::InvalidRecord { .. } => {
            Severity::Critical
        }
    }
}

/// Severity reported for each evaluation failure kind
fn evaluation_error_severity(err: &EvaluationError) -> Severity {
    match err {
        EvaluationError::InvalidSchedule { .. } => Severity::Critical,
    }
}

pub struct Evaluator {
    config: EvaluationConfig,
}

impl Evaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn label_selector(&self) -> Option<&str> {
        self.config.label_selector.as_deref()
    }

    /// Evaluate a fetched collection
    ///
    /// Scans every record; failures are collected and reported together.
    /// A malformed schedule aborts the run.
    pub fn evaluate(
        &self,
        mode: Mode,
        resources: &[ResourceRecord],
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let plural = mode.kind().plural();

        if self.config.label_selector.is_some() && resources.is_empty() {
            warn!(
                label_selector = ?self.config.label_selector,
                "Label selector matched no {}", plural
            );
            return Ok(EvaluationOutcome::unknown(format!(
                "The filter specified resulted in 0 {}",
                plural
            )));
        }

        let all = NameFilter::all();
        let names = if self.config.label_selector.is_some() {
            &all
        } else {
            &self.config.names
        };

        let mut evaluated = Vec::new();
        let mut failed = Vec::new();

        for record in resources {
            if !self.config.criteria.admits(record) || !names.matches(&record.name) {
                trace!(resource = %record.identifier(), "Filtered out");
                continue;
            }

            let is_failure = match mode {
                Mode::Schedule => {
                    let Some(last_run) = record.last_schedule_time else {
                        debug!(resource = %record.identifier(), "Never scheduled, skipping");
                        continue;
                    };
                    self.is_overrun(record, last_run, now)?
                }
                Mode::Completion => status::is_failed(record.failed_count),
            };

            info!(
                name = %record.name,
                namespace = %record.namespace,
                created = %record.creation_timestamp,
                failed = is_failure,
                "Evaluated {}", plural
            );

            evaluated.push(record.name.clone());
            if is_failure {
                failed.push(record.identifier());
            }
        }

        let outcome = if failed.is_empty() {
            EvaluationOutcome {
                severity: Severity::Ok,
                message: format!("All {} are reporting as ready", plural),
                evaluated,
                failed,
            }
        } else {
            EvaluationOutcome {
                severity: self.config.failure_severity,
                message: format!("{} failed: {}", plural, failed.join(" ")),
                evaluated,
                failed,
            }
        };

        Ok(outcome)
    }

    fn is_overrun(
        &self,
        record: &ResourceRecord,
        last_run: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, EvaluationError> {
        let invalid = |source| EvaluationError::InvalidSchedule {
            resource: record.identifier(),
            source,
        };

        let expression = record
            .schedule
            .as_deref()
            .ok_or_else(|| invalid(ScheduleError::Empty))?;
        let schedule = CronSchedule::parse(expression).map_err(&invalid)?;
        let overrun =
            schedule::is_overrun(&schedule, last_run, now, self.config.schedule_tolerance)
                .map_err(&invalid)?;

        if overrun {
            debug!(
                resource = %record.identifier(),
                schedule = %schedule.expression(),
                last_run = %last_run,
                "Last run does not match the most recent scheduled time"
            );
        }

        Ok(overrun)
    }
}

/// Fetch the collection for `mode` and evaluate it
///
/// Always produces an outcome: fetch and evaluation errors are turned into
/// their table severities.
pub async fn check(
    fetcher: &dyn ResourceFetcher,
    evaluator: &Evaluator,
    mode: Mode,
    now: DateTime<Utc>,
) -> EvaluationOutcome {
    let selector = evaluator.label_selector();
    let fetched = match mode {
        Mode::Schedule => fetcher.fetch_scheduled_resources(selector).await,
        Mode::Completion => fetcher.fetch_completion_resources(selector).await,
    };

    let resources = match fetched {
        Ok(resources) => resources,
        Err(e) => {
            error!(error = %e, "Failed to fetch {}", mode.kind().plural());
            return EvaluationOutcome::from_fetch_error(&e);
        }
    };

    debug!(count = resources.len(), "Fetched {}", mode.kind().plural());

    match evaluator.evaluate(mode, &resources, now) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Evaluation aborted");
            EvaluationOutcome::from_evaluation_error(&e)
        }
    }
}
