use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub mode: Mode,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One letter payload per row; latest valid timestamp wins per person.
    Selection,
    /// Free-text product rows classified and grouped per choice letter.
    Packages,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selection => write!(f, "selection"),
            Self::Packages => write!(f, "packages"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input + Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    /// Export file, resolved relative to the config file by the caller.
    #[serde(default)]
    pub file: Option<String>,
}

/// Candidate keywords per logical field, matched case-insensitively as
/// substrings of the export's column names. Lists left empty pick up the
/// mode's defaults (the headers the known exports use).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsConfig {
    #[serde(default)]
    pub person_key: Vec<String>,
    #[serde(default)]
    pub payload: Vec<String>,
    #[serde(default)]
    pub timestamp: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub quantity: Vec<String>,
    #[serde(default)]
    pub display_name: Vec<String>,
}

// ---------------------------------------------------------------------------
// Selection + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Valid payload letters.
    #[serde(default = "default_alphabet")]
    pub alphabet: Vec<String>,
    /// Letter assumed when the winning row has no payload at all.
    /// `None` makes absence a rejection instead.
    #[serde(default = "default_letter")]
    pub default: Option<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { alphabet: default_alphabet(), default: default_letter() }
    }
}

fn default_alphabet() -> Vec<String> {
    vec!["a".into(), "b".into(), "c".into(), "d".into()]
}

fn default_letter() -> Option<String> {
    Some("d".into())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Driver-record JSON path.
    #[serde(default)]
    pub json: Option<String>,
    /// Error report CSV path (appended to, never rewritten).
    #[serde(default)]
    pub report: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl JobConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let mut config: JobConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill unset candidate lists with the headers the known exports use.
    fn apply_defaults(&mut self) {
        let fields = &mut self.fields;
        if fields.person_key.is_empty() {
            fields.person_key = vec!["student id".into()];
        }
        if fields.display_name.is_empty() {
            fields.display_name = vec!["last name".into()];
        }
        match self.mode {
            Mode::Selection => {
                if fields.payload.is_empty() {
                    fields.payload = vec!["yearbook photo".into(), "selection".into()];
                }
                if fields.timestamp.is_empty() {
                    fields.timestamp = vec!["yearbook date".into()];
                }
            }
            Mode::Packages => {
                if fields.payload.is_empty() {
                    fields.payload = vec![
                        "product name".into(),
                        "package choice".into(),
                        "description".into(),
                    ];
                }
                if fields.secondary.is_empty() {
                    fields.secondary = vec!["photo choice".into(), "yearbook choice".into()];
                }
                if fields.quantity.is_empty() {
                    fields.quantity = vec!["quantity".into(), "qty".into()];
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::ConfigValidation("name must not be empty".into()));
        }

        if self.mode == Mode::Selection {
            if self.selection.alphabet.is_empty() {
                return Err(EngineError::ConfigValidation(
                    "selection alphabet must not be empty".into(),
                ));
            }
            for letter in &self.selection.alphabet {
                if letter.trim().is_empty() {
                    return Err(EngineError::ConfigValidation(
                        "selection alphabet entries must not be blank".into(),
                    ));
                }
            }
            if let Some(default) = &self.selection.default {
                let norm = default.trim().to_lowercase();
                let known = self
                    .selection
                    .alphabet
                    .iter()
                    .any(|a| a.trim().to_lowercase() == norm);
                if !known {
                    return Err(EngineError::ConfigValidation(format!(
                        "default payload '{default}' is not in the selection alphabet"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_selection() {
        let config = JobConfig::from_toml(
            r#"
name = "Fall Yearbook"
mode = "selection"
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Selection);
        assert_eq!(config.fields.person_key, vec!["student id"]);
        assert_eq!(config.fields.payload, vec!["yearbook photo", "selection"]);
        assert_eq!(config.fields.timestamp, vec!["yearbook date"]);
        assert_eq!(config.selection.alphabet, vec!["a", "b", "c", "d"]);
        assert_eq!(config.selection.default.as_deref(), Some("d"));
    }

    #[test]
    fn parse_minimal_packages() {
        let config = JobConfig::from_toml(
            r#"
name = "Spring Packages"
mode = "packages"
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Packages);
        assert_eq!(
            config.fields.payload,
            vec!["product name", "package choice", "description"]
        );
        assert_eq!(config.fields.secondary, vec!["photo choice", "yearbook choice"]);
        assert_eq!(config.fields.quantity, vec!["quantity", "qty"]);
        // no timestamp default in packages mode
        assert!(config.fields.timestamp.is_empty());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = JobConfig::from_toml(
            r#"
name = "Custom"
mode = "selection"

[fields]
person_key = ["member number"]
payload = ["vote"]
"#,
        )
        .unwrap();
        assert_eq!(config.fields.person_key, vec!["member number"]);
        assert_eq!(config.fields.payload, vec!["vote"]);
        // untouched lists still pick up defaults
        assert_eq!(config.fields.timestamp, vec!["yearbook date"]);
    }

    #[test]
    fn reject_default_outside_alphabet() {
        let err = JobConfig::from_toml(
            r#"
name = "Bad"
mode = "selection"

[selection]
alphabet = ["a", "b"]
default = "z"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn reject_empty_alphabet() {
        let err = JobConfig::from_toml(
            r#"
name = "Bad"
mode = "selection"

[selection]
alphabet = []
default = "a"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("alphabet"));
    }

    #[test]
    fn reject_unknown_mode() {
        let err = JobConfig::from_toml(
            r#"
name = "Bad"
mode = "selektion"
"#,
        );
        assert!(err.is_err(), "typo in mode should fail deserialization");
    }

    #[test]
    fn packages_mode_skips_selection_checks() {
        let config = JobConfig::from_toml(
            r#"
name = "Packages"
mode = "packages"

[selection]
alphabet = []
"#,
        );
        assert!(config.is_ok());
    }
}
