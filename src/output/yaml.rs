use super::CheckReport;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(report: &CheckReport) -> String {
        serde_yaml::to_string(report).unwrap_or_else(|_| "{}".to_string())
    }
}
