//! Per-person row selection: latest valid timestamp wins.
//!
//! Two-pass design: pass 1 buckets rows into immutable per-person groups,
//! pass 2 folds each group independently. Groups share no state, so every
//! failure stays scoped to its own person.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::model::{Decision, RawRow, RejectReason, RejectedEntry};
use crate::timestamp::{parse_timestamp, ParsedTimestamp};

/// All rows sharing one person key, in input order.
#[derive(Debug, Clone)]
pub struct PersonGroup {
    pub person_key: String,
    pub rows: Vec<RawRow>,
}

/// Bucket rows by trimmed person key, preserving first-seen person order.
pub fn bucket_by_person(rows: &[RawRow]) -> Vec<PersonGroup> {
    let mut groups: Vec<PersonGroup> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|g| g.person_key == row.person_key) {
            Some(group) => group.rows.push(row.clone()),
            None => groups.push(PersonGroup {
                person_key: row.person_key.clone(),
                rows: vec![row.clone()],
            }),
        }
    }
    groups
}

pub struct ReconcileContext<'a> {
    /// Whether the dataset resolved a timestamp column at all.
    pub has_timestamp_column: bool,
    /// Valid payload values; empty = any payload accepted.
    pub alphabet: &'a [String],
    /// Payload assumed when the winning row has none. `None` makes
    /// absence a rejection.
    pub default_payload: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ReconcileOutput {
    pub decisions: Vec<Decision>,
    pub rejected: Vec<RejectedEntry>,
}

pub fn reconcile(groups: &[PersonGroup], ctx: &ReconcileContext) -> ReconcileOutput {
    let mut out = ReconcileOutput::default();
    for group in groups {
        reconcile_group(group, ctx, &mut out);
    }
    out
}

fn reconcile_group(group: &PersonGroup, ctx: &ReconcileContext, out: &mut ReconcileOutput) {
    let rows = &group.rows;

    // Multiple rows and nothing to order them by: no safe pick exists.
    if rows.len() > 1 && !ctx.has_timestamp_column {
        for row in rows {
            out.rejected
                .push(RejectedEntry::new(row.clone(), RejectReason::DuplicateWithoutOrdering));
        }
        return;
    }

    let parsed: Vec<ParsedTimestamp> = rows
        .iter()
        .map(|r| parse_timestamp(r.timestamp_raw.as_deref()))
        .collect();

    // A multi-row group with any unparseable timestamp cannot be trusted
    // for ordering; reject the whole group rather than guess.
    if rows.len() > 1 && parsed.iter().any(|p| p.is_invalid()) {
        for row in rows {
            out.rejected
                .push(RejectedEntry::new(row.clone(), RejectReason::UnparseableTimestamp));
        }
        return;
    }

    // Sort descending; absent timestamps order below every valid one.
    // Stable, so ties keep input order.
    let ts = |i: usize| -> Option<NaiveDateTime> { parsed[i].valid() };
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| ts(b).cmp(&ts(a)));

    let winner = order[0];
    let winner_ts = ts(winner);

    if rows.len() > 1 {
        let tied: Vec<usize> = order.iter().copied().filter(|&i| ts(i) == winner_ts).collect();
        if tied.len() > 1 {
            let payloads: BTreeSet<String> = tied
                .iter()
                .map(|&i| normalized_payload(&rows[i]))
                .collect();
            if payloads.len() > 1 {
                let siblings: Vec<usize> = tied.iter().map(|&i| rows[i].row).collect();
                for &i in &tied {
                    out.rejected.push(RejectedEntry {
                        row: rows[i].clone(),
                        reason: RejectReason::ConflictingPayload,
                        siblings: siblings.clone(),
                    });
                }
                return;
            }
        }
    }

    let winning_row = &rows[winner];
    let payload = winning_row
        .payload
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let resolved = match payload {
        Some(value) => {
            let norm = value.to_lowercase();
            let valid = ctx.alphabet.is_empty()
                || ctx.alphabet.iter().any(|a| a.trim().to_lowercase() == norm);
            if !valid {
                out.rejected.push(RejectedEntry::new(
                    winning_row.clone(),
                    RejectReason::InvalidPayload(value.to_string()),
                ));
                return;
            }
            norm
        }
        // Absent (not invalid): fall back to the configured default.
        None => match ctx.default_payload {
            Some(default) => default.to_lowercase(),
            None => {
                out.rejected.push(RejectedEntry::new(
                    winning_row.clone(),
                    RejectReason::InvalidPayload(String::new()),
                ));
                return;
            }
        },
    };

    out.decisions.push(Decision {
        person_key: group.person_key.clone(),
        display_name: winning_row.display_name.clone(),
        payload: resolved,
        decided_at: winner_ts,
    });
}

fn normalized_payload(row: &RawRow) -> String {
    row.payload.as_deref().unwrap_or("").trim().to_lowercase()
}
