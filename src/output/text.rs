use super::CheckReport;

/// Single status line in the monitoring plugin convention
pub struct TextFormatter;

impl TextFormatter {
    pub fn format(report: &CheckReport) -> String {
        format!("{} {}: {}", report.check, report.status, report.message)
    }
}
