use super::CheckReport;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(report: &CheckReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }
}
