//! Stable exit codes for crew CLI commands.

/// Command succeeded, or the user declined to start a run.
pub const OK: i32 = 0;
/// Invalid input or config, or any other failure.
pub const INVALID: i32 = 1;
/// The model server could not be reached.
pub const UNREACHABLE: i32 = 2;
