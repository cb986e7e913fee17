mod json;
mod text;
mod yaml;

pub use json::JsonFormatter;
pub use text::TextFormatter;
pub use yaml::YamlFormatter;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::evaluation::{EvaluationOutcome, Severity};

/// Final result of a check run, as printed on stdout
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check: String,
    pub status: Severity,
    pub message: String,
    pub evaluated: Vec<String>,
    pub failed: Vec<String>,
}

impl CheckReport {
    pub fn new(check: &str, outcome: EvaluationOutcome) -> Self {
        Self {
            check: check.to_string(),
            status: outcome.severity,
            message: outcome.message,
            evaluated: outcome.evaluated,
            failed: outcome.failed,
        }
    }

    pub fn format(&self, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Text => TextFormatter::format(self),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}
