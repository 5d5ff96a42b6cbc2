//! CSV and JSON rendering of result rows.

use serde_json::Value;

use crate::errors::AppError;
use crate::lakehouse::{Column, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Result<Self, AppError> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None | Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(AppError::Validation(format!(
                "unsupported export format '{}'; use csv or json",
                other
            ))),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Header row of column names, then one line per row. Missing cells are empty.
pub fn to_csv(columns: &[Column], rows: &[Row]) -> String {
    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| escape_field(&c.name)).collect();
    out.push_str(&header.join(","));

    for row in rows {
        out.push('\n');
        let line: Vec<String> = columns
            .iter()
            .map(|c| escape_field(&cell_text(row.get(&c.name))))
            .collect();
        out.push_str(&line.join(","));
    }
    out
}

pub fn to_json(rows: &[Row]) -> Result<String, AppError> {
    serde_json::to_string_pretty(rows).map_err(|e| AppError::Internal(e.into()))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
