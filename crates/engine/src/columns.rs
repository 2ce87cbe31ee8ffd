//! Header resolution: maps loosely-named export columns to logical fields.
//!
//! Runs once per dataset, before any row is processed. A required field
//! with no match rejects the whole dataset up front.

use crate::config::JobConfig;
use crate::error::EngineError;

/// Find the first column whose name contains any candidate keyword
/// (case-insensitive, trimmed). Columns are scanned in sheet order.
/// No fuzzy or typo tolerance.
pub fn find_column(headers: &[String], candidates: &[String]) -> Option<String> {
    for header in headers {
        let name = header.trim().to_lowercase();
        for candidate in candidates {
            if name.contains(&candidate.trim().to_lowercase()) {
                return Some(header.clone());
            }
        }
    }
    None
}

/// Logical field → actual column name for one dataset.
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    pub person_key: String,
    pub payload: String,
    pub timestamp: Option<String>,
    pub secondary: Option<String>,
    pub quantity: Option<String>,
    pub display_name: Option<String>,
}

impl ResolvedColumns {
    pub fn resolve(headers: &[String], config: &JobConfig) -> Result<Self, EngineError> {
        let required = |field: &'static str, candidates: &[String]| {
            find_column(headers, candidates).ok_or_else(|| EngineError::MissingColumn {
                field,
                candidates: candidates.to_vec(),
            })
        };
        let optional = |candidates: &[String]| {
            if candidates.is_empty() {
                None
            } else {
                find_column(headers, candidates)
            }
        };

        Ok(Self {
            person_key: required("person key", &config.fields.person_key)?,
            payload: required("payload", &config.fields.payload)?,
            timestamp: optional(&config.fields.timestamp),
            secondary: optional(&config.fields.secondary),
            quantity: optional(&config.fields.quantity),
            display_name: optional(&config.fields.display_name),
        })
    }
}
