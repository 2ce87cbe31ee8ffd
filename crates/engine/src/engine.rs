//! Engine façade: CSV loading and the per-mode run loop.

use std::collections::BTreeMap;

use crate::columns::ResolvedColumns;
use crate::config::{JobConfig, Mode};
use crate::error::EngineError;
use crate::grouping::group_and_limit;
use crate::model::{
    PersonPackages, RawRow, RejectReason, RejectedEntry, RunMeta, RunResult, RunSummary,
};
use crate::reconcile::{bucket_by_person, reconcile, ReconcileContext};

/// A fully loaded, column-resolved dataset. Immutable snapshot for the
/// duration of one run.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub headers: Vec<String>,
    pub columns: ResolvedColumns,
    pub rows: Vec<RawRow>,
    /// Rows rejected at load time (blank person key).
    pub rejected: Vec<RejectedEntry>,
}

/// Load CSV text into rows, resolving columns first. A missing required
/// column rejects the whole dataset before any row is read.
pub fn load_csv_rows(csv_data: &str, config: &JobConfig) -> Result<RunInput, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let columns = ResolvedColumns::resolve(&headers, config)?;

    let position = |name: &str| headers.iter().position(|h| h == name);
    let person_idx = position(&columns.person_key);
    let payload_idx = position(&columns.payload);
    let timestamp_idx = columns.timestamp.as_deref().and_then(position);
    let secondary_idx = columns.secondary.as_deref().and_then(position);
    let quantity_idx = columns.quantity.as_deref().and_then(position);
    let display_idx = columns.display_name.as_deref().and_then(position);

    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| EngineError::Csv(e.to_string()))?;

        let cell = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|idx| record.get(idx))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut raw_fields = BTreeMap::new();
        for (ci, header) in headers.iter().enumerate() {
            raw_fields.insert(header.clone(), record.get(ci).unwrap_or("").to_string());
        }

        let row = RawRow {
            row: i + 1,
            person_key: cell(person_idx).unwrap_or_default(),
            display_name: cell(display_idx).unwrap_or_default(),
            payload: cell(payload_idx),
            timestamp_raw: cell(timestamp_idx),
            secondary: cell(secondary_idx),
            quantity: parse_quantity(cell(quantity_idx).as_deref()),
            raw_fields,
        };

        if row.person_key.is_empty() {
            rejected.push(RejectedEntry::new(row, RejectReason::MissingPersonKey));
            continue;
        }
        rows.push(row);
    }

    Ok(RunInput { headers, columns, rows, rejected })
}

/// Exports sometimes carry quantities as floats ("2.0"); unparseable or
/// sub-1 values fall back to 1 rather than rejecting the row.
fn parse_quantity(raw: Option<&str>) -> u32 {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return 1,
    };
    let quantity = raw
        .parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as u32))
        .unwrap_or(1);
    quantity.max(1)
}

/// Run reconciliation per config over an immutable input snapshot.
/// Infallible by design: every per-row/per-person failure is data in the
/// rejection stream, never a propagated error.
pub fn run(config: &JobConfig, input: &RunInput) -> RunResult {
    let groups = bucket_by_person(&input.rows);
    let persons = groups.len();

    let mut rejected = input.rejected.clone();
    let mut decisions = Vec::new();
    let mut packages: Vec<PersonPackages> = Vec::new();
    let mut ignored = 0usize;

    match config.mode {
        Mode::Selection => {
            let ctx = ReconcileContext {
                has_timestamp_column: input.columns.timestamp.is_some(),
                alphabet: &config.selection.alphabet,
                default_payload: config.selection.default.as_deref(),
            };
            let out = reconcile(&groups, &ctx);
            decisions = out.decisions;
            rejected.extend(out.rejected);
        }
        Mode::Packages => {
            for group in &groups {
                let out = group_and_limit(&group.rows);
                ignored += out.ignored;
                rejected.extend(out.rejected);
                if !out.groups.is_empty() {
                    packages.push(PersonPackages {
                        person_key: group.person_key.clone(),
                        display_name: group
                            .rows
                            .first()
                            .map(|r| r.display_name.clone())
                            .unwrap_or_default(),
                        groups: out.groups,
                    });
                }
            }
        }
    }

    let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &rejected {
        *reasons.entry(entry.reason.kind().to_string()).or_insert(0) += 1;
    }

    RunResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            mode: config.mode,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: RunSummary {
            persons,
            accepted: decisions.len() + packages.len(),
            rejected_rows: rejected.len(),
            ignored_rows: ignored,
            reasons,
        },
        decisions,
        packages,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection_config() -> JobConfig {
        JobConfig::from_toml("name = \"T\"\nmode = \"selection\"").unwrap()
    }

    fn packages_config() -> JobConfig {
        JobConfig::from_toml("name = \"T\"\nmode = \"packages\"").unwrap()
    }

    #[test]
    fn load_csv_basic() {
        let csv = "\
Student ID,Student Last Name,Yearbook Photo,Yearbook Date
187259,Abrokwa,a,10/6/2025 18:57
180883,Alba,c,10/9/2025 17:39
";
        let input = load_csv_rows(csv, &selection_config()).unwrap();
        assert_eq!(input.rows.len(), 2);
        assert_eq!(input.rows[0].person_key, "187259");
        assert_eq!(input.rows[0].display_name, "Abrokwa");
        assert_eq!(input.rows[0].payload.as_deref(), Some("a"));
        assert_eq!(input.rows[0].timestamp_raw.as_deref(), Some("10/6/2025 18:57"));
        assert!(input.columns.timestamp.is_some());
        assert!(input.rejected.is_empty());
    }

    #[test]
    fn load_csv_rejects_missing_required_column() {
        let csv = "Last Name,Yearbook Photo\nAbrokwa,a\n";
        let err = load_csv_rows(csv, &selection_config()).unwrap_err();
        assert!(err.to_string().contains("person key"));
    }

    #[test]
    fn blank_person_key_is_rejected_row_not_error() {
        let csv = "\
Student ID,Yearbook Photo
187259,a
,b
";
        let input = load_csv_rows(csv, &selection_config()).unwrap();
        assert_eq!(input.rows.len(), 1);
        assert_eq!(input.rejected.len(), 1);
        assert_eq!(input.rejected[0].reason, RejectReason::MissingPersonKey);
    }

    #[test]
    fn quantity_parsing_tolerates_floats_and_junk() {
        assert_eq!(parse_quantity(None), 1);
        assert_eq!(parse_quantity(Some("3")), 3);
        assert_eq!(parse_quantity(Some("2.0")), 2);
        assert_eq!(parse_quantity(Some("zero")), 1);
        assert_eq!(parse_quantity(Some("0")), 1);
    }

    #[test]
    fn run_selection_end_to_end() {
        let csv = "\
Student ID,Student Last Name,Yearbook Photo,Yearbook Date
187259,Abrokwa,a,10/6/2025 18:57
187259,Abrokwa,b,10/6/2025 22:21
180883,Alba,z,10/9/2025 17:39
";
        let config = selection_config();
        let input = load_csv_rows(csv, &config).unwrap();
        let result = run(&config, &input);

        assert_eq!(result.summary.persons, 2);
        assert_eq!(result.summary.accepted, 1);
        assert_eq!(result.decisions.len(), 1);
        assert_eq!(result.decisions[0].payload, "b");
        assert_eq!(result.summary.rejected_rows, 1);
        assert_eq!(result.summary.reasons["invalid_payload"], 1);
    }

    #[test]
    fn run_packages_end_to_end() {
        let csv = "\
Student ID,Student Last Name,Photo Choice,Product Name,Quantity
175738,Arafat,a,3x5 Package,2
175738,Arafat,a,Touch Up Photos,1
175738,Arafat,b,Lost Order Form,1
";
        let config = packages_config();
        let input = load_csv_rows(csv, &config).unwrap();
        let result = run(&config, &input);

        assert_eq!(result.summary.persons, 1);
        assert_eq!(result.packages.len(), 1);
        let groups = &result.packages[0].groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].package_codes, "ff");
        assert_eq!(result.summary.rejected_rows, 1);
        assert_eq!(result.summary.reasons["unrecognized_item"], 1);
    }
}
