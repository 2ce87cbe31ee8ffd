//! Timestamp parsing for the export's ordering column.
//!
//! Absent and unparseable values are distinct states: a single-row person
//! tolerates either, a multi-row person tolerates neither being invalid.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// The export's native format, tried first.
const STRICT_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Fallbacks for hand-edited cells.
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const FALLBACK_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// Cell blank or column value missing.
    Absent,
    /// Cell present but no format matched.
    Invalid,
    Valid(NaiveDateTime),
}

impl ParsedTimestamp {
    pub fn valid(self) -> Option<NaiveDateTime> {
        match self {
            Self::Valid(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn is_invalid(self) -> bool {
        self == Self::Invalid
    }
}

pub fn parse_timestamp(raw: Option<&str>) -> ParsedTimestamp {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return ParsedTimestamp::Absent,
    };
    if raw.is_empty() {
        return ParsedTimestamp::Absent;
    }

    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, STRICT_FORMAT) {
        return ParsedTimestamp::Valid(ts);
    }
    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return ParsedTimestamp::Valid(ts);
        }
    }
    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return ParsedTimestamp::Valid(date.and_time(NaiveTime::MIN));
        }
    }

    ParsedTimestamp::Invalid
}
