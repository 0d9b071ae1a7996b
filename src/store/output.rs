//! Output formatting for query results.

use super::QueryResult;
use serde_json::{Map, Value};
use std::io::Write;

/// Widest a table cell may grow before it is truncated
const MAX_CELL_WIDTH: usize = 50;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    /// Box-drawn table (default)
    #[default]
    Table,
    /// JSON array of objects
    Json,
    /// One JSON object per line
    JsonLines,
    Csv,
    Tsv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" | "ndjson" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            _ => Err(format!(
                "Unknown format: {}. Valid: table, json, jsonl, csv, tsv",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

impl OutputFormat {
    /// Pick a format from a file extension, if it names one
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "json" => Some(OutputFormat::Json),
            "jsonl" | "ndjson" => Some(OutputFormat::JsonLines),
            "csv" => Some(OutputFormat::Csv),
            "tsv" => Some(OutputFormat::Tsv),
            _ => None,
        }
    }
}

/// Formatter for query results
pub struct QueryResultFormatter;

impl QueryResultFormatter {
    pub fn format(result: &QueryResult, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(result),
            OutputFormat::Json => {
                let rows: Vec<Value> = Self::json_rows(result).map(Value::Object).collect();
                serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::JsonLines => Self::json_rows(result)
                .map(|obj| {
                    serde_json::to_string(&Value::Object(obj)).unwrap_or_else(|_| "{}".to_string())
                })
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Csv => Self::format_delimited(result, ",", Self::csv_escape),
            OutputFormat::Tsv => Self::format_delimited(result, "\t", Self::tsv_escape),
        }
    }

    pub fn write<W: Write>(
        result: &QueryResult,
        format: OutputFormat,
        writer: &mut W,
    ) -> std::io::Result<()> {
        writer.write_all(Self::format(result, format).as_bytes())
    }

    fn format_table(result: &QueryResult) -> String {
        if result.columns.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
        for row in &result.rows {
            for (width, val) in widths.iter_mut().zip(row) {
                *width = (*width).max(val.chars().count());
            }
        }
        widths.iter_mut().for_each(|w| *w = (*w).min(MAX_CELL_WIDTH));

        let border = |left: char, mid: char, right: char| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}\n", left, segments.join(&mid.to_string()), right)
        };
        let line = |values: &[String]| {
            let mut out = String::from("│");
            for (val, width) in values.iter().zip(&widths) {
                out.push_str(&format!(" {:width$} │", Self::truncate(val, *width), width = *width));
            }
            out.push('\n');
            out
        };

        let mut output = border('┌', '┬', '┐');
        output.push_str(&line(&result.columns));
        output.push_str(&border('├', '┼', '┤'));
        for row in &result.rows {
            output.push_str(&line(row));
        }
        output.push_str(&border('└', '┴', '┘'));

        let n = result.rows.len();
        output.push_str(&format!("{} row{}\n", n, if n == 1 { "" } else { "s" }));
        output
    }

    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
            format!("{}…", kept)
        }
    }

    fn json_rows(result: &QueryResult) -> impl Iterator<Item = Map<String, Value>> + '_ {
        result.rows.iter().map(|row| {
            result
                .columns
                .iter()
                .zip(row)
                .map(|(col, val)| (col.clone(), Self::json_value(val)))
                .collect()
        })
    }

    /// Typed JSON value for a rendered cell
    fn json_value(val: &str) -> Value {
        if val == "NULL" {
            return Value::Null;
        }
        if let Ok(n) = val.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(num) = val.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(num);
        }
        match val {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(val.to_string()),
        }
    }

    fn format_delimited(result: &QueryResult, sep: &str, escape: fn(&str) -> String) -> String {
        let mut output = String::new();
        for values in std::iter::once(&result.columns).chain(&result.rows) {
            let cells: Vec<String> = values.iter().map(|v| escape(v)).collect();
            output.push_str(&cells.join(sep));
            output.push('\n');
        }
        output
    }

    fn csv_escape(val: &str) -> String {
        if val.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", val.replace('"', "\"\""))
        } else {
            val.to_string()
        }
    }

    fn tsv_escape(val: &str) -> String {
        val.replace('\t', "\\t").replace('\n', "\\n").replace('\r', "\\r")
    }
}
