//! Report assembly: the driver record stream and the append-only error
//! report.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::EngineError;
use crate::model::{ChoiceGroup, RejectedEntry, RunResult};

/// Trailing column appended to the input's own columns in the error report.
pub const REASON_COLUMN: &str = "error_reason";

// ---------------------------------------------------------------------------
// Driver records
// ---------------------------------------------------------------------------

/// One record per accepted person, in the shape the automation driver
/// replays: person key, name fields, selection, then per-group line items.
#[derive(Debug, Clone, Serialize)]
pub struct DriverRecord {
    pub person_key: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ChoiceGroup>,
}

/// Flatten a run's accepted output into the uniform driver sequence.
/// The sequence never contains two records for the same person.
pub fn driver_records(result: &RunResult) -> Vec<DriverRecord> {
    let mut records: Vec<DriverRecord> = result
        .decisions
        .iter()
        .map(|d| DriverRecord {
            person_key: d.person_key.clone(),
            display_name: d.display_name.clone(),
            selection: Some(d.payload.clone()),
            decided_at: d.decided_at,
            groups: Vec::new(),
        })
        .collect();

    records.extend(result.packages.iter().map(|p| DriverRecord {
        person_key: p.person_key.clone(),
        display_name: p.display_name.clone(),
        selection: None,
        decided_at: None,
        groups: p.groups.clone(),
    }));

    records
}

// ---------------------------------------------------------------------------
// Error report
// ---------------------------------------------------------------------------

/// Tabular error report: the input's own columns plus a trailing reason
/// column, one row per rejected input row. Rows are only ever appended;
/// render without the header to extend an existing report file.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ErrorReport {
    pub fn new(input_columns: &[String], rejected: &[RejectedEntry]) -> Self {
        let mut columns = input_columns.to_vec();
        columns.push(REASON_COLUMN.into());

        let rows = rejected
            .iter()
            .map(|entry| {
                let mut record: Vec<String> = input_columns
                    .iter()
                    .map(|c| entry.row.raw_fields.get(c).cloned().unwrap_or_default())
                    .collect();
                record.push(entry.reason.to_string());
                record
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CSV text; pass `with_header = false` when appending.
    pub fn render_csv(&self, with_header: bool) -> Result<String, EngineError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if with_header {
            writer
                .write_record(&self.columns)
                .map_err(|e| EngineError::Csv(e.to_string()))?;
        }
        for row in &self.rows {
            writer.write_record(row).map_err(|e| EngineError::Csv(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| EngineError::Csv(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::Csv(e.to_string()))
    }
}
