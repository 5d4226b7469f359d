//! Extracted business-card rows and per-file error records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column order used when a row is exported to a spreadsheet.
pub const ROW_COLUMNS: [&str; 16] = [
    "timestamp",
    "fullName",
    "jobTitle",
    "company",
    "phone1",
    "phone2",
    "email1",
    "email2",
    "website",
    "address",
    "notes",
    "confidence",
    "rawText",
    "fileName",
    "fileId",
    "fileLink",
];

/// A single normalized business-card row (16 fields).
///
/// Every optional field is either `None` or a non-empty trimmed string.
/// `timestamp` is always populated once a row has been normalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRow {
    pub timestamp: String,
    pub full_name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
    pub email1: Option<String>,
    pub email2: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub confidence: Option<f64>,
    pub raw_text: Option<String>,
    pub file_name: Option<String>,
    pub file_id: Option<String>,
    pub file_link: Option<String>,
}

impl ExtractedRow {
    /// Cell values in [`ROW_COLUMNS`] order. Missing values become JSON null.
    pub fn to_sheet_values(&self) -> Vec<Value> {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        vec![
            Value::String(self.timestamp.clone()),
            text(&self.full_name),
            text(&self.job_title),
            text(&self.company),
            text(&self.phone1),
            text(&self.phone2),
            text(&self.email1),
            text(&self.email2),
            text(&self.website),
            text(&self.address),
            text(&self.notes),
            self.confidence
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            text(&self.raw_text),
            text(&self.file_name),
            text(&self.file_id),
            text(&self.file_link),
        ]
    }
}

/// Per-file error entry reported alongside the successful rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub file_name: Option<String>,
    pub file_id: Option<String>,
    pub error: String,
}

impl FileError {
    pub fn new(
        file_name: Option<String>,
        file_id: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file_name,
            file_id,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_with_camel_case_names() {
        let row = ExtractedRow {
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            full_name: Some("John Doe".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), ROW_COLUMNS.len());
        for column in ROW_COLUMNS {
            assert!(object.contains_key(column), "missing column {}", column);
        }
        assert_eq!(json["fullName"], "John Doe");
        assert!(json["email1"].is_null());
    }

    #[test]
    fn test_sheet_values_follow_column_order() {
        let row = ExtractedRow {
            timestamp: "ts".to_string(),
            company: Some("ABC Pvt Ltd".to_string()),
            confidence: Some(0.86),
            file_link: Some("https://example.com/f".to_string()),
            ..Default::default()
        };

        let values = row.to_sheet_values();
        assert_eq!(values.len(), 16);
        assert_eq!(values[0], "ts");
        assert_eq!(values[3], "ABC Pvt Ltd");
        assert_eq!(values[11].as_f64(), Some(0.86));
        assert_eq!(values[15], "https://example.com/f");
        assert!(values[1].is_null());
    }
}
