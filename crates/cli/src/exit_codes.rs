//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | CLI usage error (bad args, malformed move)       |
//! | 3    | Audit found data-quality issues                  |
//! | 4    | Invalid configuration (weights, thresholds)      |
//! | 5    | Move integrity error (record not owned)          |
//! | 6    | Runtime error (I/O, unreadable input)            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `engine_exit_code` or the relevant command

use loadscope_workload::EngineError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, same person on both sides of a move.
pub const EXIT_USAGE: u8 = 2;

/// `audit` completed and reported at least one issue.
pub const EXIT_AUDIT_ISSUES: u8 = 3;

/// Config could not be parsed or failed validation (missing default, bad weight, ...).
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// A move named a record that the source person does not own.
pub const EXIT_MOVE_INTEGRITY: u8 = 5;

/// I/O or input parse error (unreadable file, missing column, bad number).
pub const EXIT_RUNTIME: u8 = 6;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        e if e.is_configuration() => EXIT_INVALID_CONFIG,
        EngineError::InvalidAvailableHours { .. } => EXIT_INVALID_CONFIG,
        EngineError::MoveIntegrity { .. } => EXIT_MOVE_INTEGRITY,
        EngineError::MoveRequest(_) => EXIT_USAGE,
        EngineError::MissingColumn { .. } | EngineError::ValueParse { .. } | EngineError::Io(_) => {
            EXIT_RUNTIME
        }
        _ => EXIT_ERROR,
    }
}
