use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::config::Mode;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single normalized row from the order export.
#[derive(Debug, Clone, Serialize)]
pub struct RawRow {
    /// 1-based data row number (header excluded), for error reporting.
    pub row: usize,
    pub person_key: String,
    pub display_name: String,
    /// Selection letter or free product text. `None` = cell blank/missing.
    pub payload: Option<String>,
    /// Unparsed timestamp cell; absent vs unparseable is decided later.
    pub timestamp_raw: Option<String>,
    /// Secondary grouping letter (photo choice).
    pub secondary: Option<String>,
    pub quantity: u32,
    /// Full original row, column name → cell, for the error report.
    pub raw_fields: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Decisions (selection mode)
// ---------------------------------------------------------------------------

/// The single accepted outcome for one person.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub person_key: String,
    pub display_name: String,
    pub payload: String,
    /// Timestamp of the winning row; `None` when it had no timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<NaiveDateTime>,
}

impl Decision {
    /// 0-based list position the automation driver selects for this
    /// payload letter (`'a'` → 0, `'b'` → 1, …). `None` for non-letter
    /// payloads.
    pub fn selection_index(&self) -> Option<usize> {
        let c = self.payload.trim().chars().next()?;
        let c = c.to_ascii_lowercase();
        c.is_ascii_lowercase().then(|| c as usize - 'a' as usize)
    }
}

// ---------------------------------------------------------------------------
// Classification (packages mode)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Standard,
    Grouped,
    Addon,
    Service,
    Ignored,
    Unknown,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Grouped => write!(f, "grouped"),
            Self::Addon => write!(f, "addon"),
            Self::Service => write!(f, "service"),
            Self::Ignored => write!(f, "ignored"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Where the driver places a non-standard item on screen.
///
/// Grouped items land in one of two destinations depending on whether the
/// group also contains a standard package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    AddonSlot,
    ServiceSlot,
    GroupWithPackage,
    GroupAlone,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddonSlot => write!(f, "addon_slot"),
            Self::ServiceSlot => write!(f, "service_slot"),
            Self::GroupWithPackage => write!(f, "group_with_package"),
            Self::GroupAlone => write!(f, "group_alone"),
        }
    }
}

/// One classified payload owned by exactly one choice group.
#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub code: String,
    pub category: Category,
    pub target: Target,
    pub raw_text: String,
}

/// All of one person's accepted items sharing a secondary key.
#[derive(Debug, Clone, Serialize)]
pub struct ChoiceGroup {
    /// `None` = the implicit group when no secondary column/value exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    /// Quantity-expanded standard codes, e.g. `"ffs"`.
    pub package_codes: String,
    pub has_package: bool,
    pub items: Vec<LineItem>,
}

/// Packages-mode accepted outcome for one person.
#[derive(Debug, Clone, Serialize)]
pub struct PersonPackages {
    pub person_key: String,
    pub display_name: String,
    pub groups: Vec<ChoiceGroup>,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Multiple rows for one person and no timestamp column to order them.
    DuplicateWithoutOrdering,
    /// Multi-row group with at least one unparseable timestamp.
    UnparseableTimestamp,
    /// Rows tied at the latest timestamp disagree on payload.
    ConflictingPayload,
    /// Winning payload outside the configured alphabet.
    InvalidPayload(String),
    /// Person key blank after trimming.
    MissingPersonKey,
    DuplicateLineItem,
    TooManyGroupedTypes,
    QuantityNotAllowed { category: Category, quantity: u32 },
    DuplicateCategoryItem(Category),
    UnrecognizedItem,
}

impl RejectReason {
    /// Stable machine key used in summary counts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateWithoutOrdering => "duplicate_without_ordering",
            Self::UnparseableTimestamp => "unparseable_timestamp",
            Self::ConflictingPayload => "conflicting_payload",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::MissingPersonKey => "missing_person_key",
            Self::DuplicateLineItem => "duplicate_line_item",
            Self::TooManyGroupedTypes => "too_many_grouped_types",
            Self::QuantityNotAllowed { .. } => "quantity_not_allowed",
            Self::DuplicateCategoryItem(_) => "duplicate_category_item",
            Self::UnrecognizedItem => "unrecognized_item",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateWithoutOrdering => write!(f, "duplicate rows, no ordering field"),
            Self::UnparseableTimestamp => {
                write!(f, "multiple rows with invalid/unparseable date")
            }
            Self::ConflictingPayload => {
                write!(f, "conflicting payload at identical latest timestamp")
            }
            Self::InvalidPayload(value) => write!(f, "invalid payload value: '{value}'"),
            Self::MissingPersonKey => write!(f, "missing person key"),
            Self::DuplicateLineItem => write!(f, "duplicate line item"),
            Self::TooManyGroupedTypes => write!(f, "too many distinct grouped-item types"),
            Self::QuantityNotAllowed { category, quantity } => {
                write!(f, "quantity {quantity} not allowed for {category}")
            }
            Self::DuplicateCategoryItem(category) => {
                write!(f, "duplicate {category} item (only one allowed)")
            }
            Self::UnrecognizedItem => write!(f, "unrecognized item"),
        }
    }
}

impl Serialize for RejectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A rejected input row plus the reason it was excluded. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntry {
    pub row: RawRow,
    pub reason: RejectReason,
    /// Row numbers of the conflicting set (conflicts only, self included).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub siblings: Vec<usize>,
}

impl RejectedEntry {
    pub fn new(row: RawRow, reason: RejectReason) -> Self {
        Self { row, reason, siblings: Vec::new() }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Distinct person keys seen in the input.
    pub persons: usize,
    /// Persons with a decision (selection) or at least one group (packages).
    pub accepted: usize,
    pub rejected_rows: usize,
    pub ignored_rows: usize,
    /// Rejection counts keyed by reason kind.
    pub reasons: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub mode: Mode,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub decisions: Vec<Decision>,
    pub packages: Vec<PersonPackages>,
    pub rejected: Vec<RejectedEntry>,
}
