use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty alphabet, default outside it, etc.).
    ConfigValidation(String),
    /// A required logical field has no matching column in the input.
    /// Fatal for the whole dataset; raised before any row is processed.
    MissingColumn { field: &'static str, candidates: Vec<String> },
    /// CSV read error.
    Csv(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { field, candidates } => {
                write!(
                    f,
                    "missing required column for {field} (looked for: {})",
                    candidates.join(", ")
                )
            }
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
