//! CLI exit code registry.
//!
//! Single source of truth for all exit codes. Exit codes are part of the
//! shell contract — wrapper scripts branch on them.
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | Success                                        |
//! | 1    | General error (unspecified)                    |
//! | 2    | CLI usage error (clap)                         |
//! | 3    | Run accepted nothing — no decisions to drive   |
//! | 4    | Invalid job config                             |
//! | 5    | Required column missing from the input         |
//! | 6    | Input/output file error                        |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Run completed but accepted zero persons; there is nothing for the
/// automation driver to replay.
pub const EXIT_NO_DECISIONS: u8 = 3;

/// Job config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// A required logical field resolved to no input column.
pub const EXIT_MISSING_COLUMN: u8 = 5;

/// File read/write error (config, input CSV, outputs).
pub const EXIT_IO: u8 = 6;
