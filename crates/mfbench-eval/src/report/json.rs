//! JSON report generation

use crate::error::BenchResult;
use crate::metrics::EvalReport;

/// JSON report generator
pub struct JsonReporter;

impl JsonReporter {
    /// Generate a pretty-printed JSON report
    pub fn generate(report: &EvalReport) -> BenchResult<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Parse a report produced by [`JsonReporter::generate`]
    pub fn parse(content: &str) -> BenchResult<EvalReport> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_json_generation_parses_back() {
        let report = sample_report();
        let json = JsonReporter::generate(&report).unwrap();

        assert!(json.contains("\"run_id\""));
        assert!(json.contains("XMainframe-Instruct"));
        let parsed = JsonReporter::parse(&json).unwrap();
        assert_eq!(parsed.tasks, report.tasks);
        assert_eq!(parsed.composite.value, 0.5);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let report = sample_report();
        let mut value = serde_json::to_value(&report).unwrap();
        value["written_by_a_newer_version"] = serde_json::json!(true);

        let parsed = JsonReporter::parse(&value.to_string()).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
    }
}
