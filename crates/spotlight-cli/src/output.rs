//! Output formatting utilities

use serde::Serialize;
use spotlight_core::{GatherSummary, ResultValue};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Everything a search prints
#[derive(Debug, Serialize)]
pub struct SearchReport<'a> {
    pub query: &'a str,
    pub attribute: &'a str,
    pub results: &'a [ResultValue],
    /// Results dropped by `--limit`
    pub truncated: usize,
    pub summary: &'a GatherSummary,
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Format a search report
pub fn format_report(report: &SearchReport<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut out = format!("index,{}\n", csv_field(report.attribute));
            for (index, value) in report.results.iter().enumerate() {
                out.push_str(&format!("{},{}\n", index, csv_field(&value.to_string())));
            }
            out
        }
        OutputFormat::Table => {
            let mut out = String::new();
            for value in report.results {
                out.push_str(&value.to_string());
                out.push('\n');
            }
            if report.truncated > 0 {
                out.push_str(&format!("... {} more\n", report.truncated));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize) -> GatherSummary {
        serde_json::from_value(serde_json::json!({
            "total": total,
            "delivered": total,
            "updates": 0,
            "finished_at": "2024-03-01T12:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Table);
    }

    #[test]
    fn test_table_and_csv() {
        let results = vec![ResultValue::from("Documents"), ResultValue::from("a,b")];
        let summary = summary(3);
        let report = SearchReport {
            query: "q",
            attribute: "kMDItemDisplayName",
            results: &results,
            truncated: 1,
            summary: &summary,
        };

        assert_eq!(
            format_report(&report, OutputFormat::Table),
            "Documents\na,b\n... 1 more\n"
        );
        assert_eq!(
            format_report(&report, OutputFormat::Csv),
            "index,kMDItemDisplayName\n0,Documents\n1,\"a,b\"\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(&format_report(&report, OutputFormat::Json)).unwrap();
        assert_eq!(json["results"][0], "Documents");
        assert_eq!(json["summary"]["total"], 3);
    }
}
