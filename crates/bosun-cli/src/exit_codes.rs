//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Configuration error - unreadable, malformed or invalid document
pub const CONFIG_ERROR: i32 = 2;

/// Execution error - a helm invocation exited non-zero
pub const EXECUTION_ERROR: i32 = 3;

/// Overlay error - staging the post-render pipeline failed
pub const OVERLAY_ERROR: i32 = 4;

/// IO error - working directory or file system failure
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Unavailable - a required executable or plugin is missing (sysexits.h EX_UNAVAILABLE)
pub const UNAVAILABLE: i32 = 69;
