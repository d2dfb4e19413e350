//! Stable exit codes for pgrotate CLI commands.

/// Run succeeded. Individual prune deletion failures are reported but do not
/// change this code.
pub const OK: i32 = 0;
/// Unexpected failure during planning or pruning.
pub const FAILURE: i32 = 1;
/// Required configuration is missing or malformed.
pub const CONFIG: i32 = 2;
/// The backup command exited nonzero, timed out, or could not be started.
pub const BACKUP_FAILED: i32 = 3;
/// A planned incremental has no anchor manifest to build on.
pub const MISSING_MANIFEST: i32 = 4;
