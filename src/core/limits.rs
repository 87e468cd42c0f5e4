/*!
 * Limits and Constants
 *
 * Centralized location for transfer sizes, exit codes and defaults.
 * Values are grouped by domain (pipe I/O, process launch).
 */

// =============================================================================
// PIPE I/O
// =============================================================================

/// Intermediate buffer used by the read loop (4KB)
/// [PERF] One page per read syscall; larger reads rarely help on a pipe
pub const TRANSFER_BUFFER_SIZE: usize = 4096;

/// Kernel pipe buffer size on Linux (64KB)
/// [LINUX-COMPAT] Output beyond this blocks the child until the parent reads
pub const KERNEL_PIPE_CAPACITY: usize = 65536;

// =============================================================================
// PROCESS LAUNCH
// =============================================================================

/// Exit status of a child whose image replacement failed
/// [LINUX-COMPAT] Same code shells use for "command not found"
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Program launched when nothing else is configured
pub const DEFAULT_PROGRAM: &str = "cowsay";

/// Input text used by the demo binary when no arguments are given
pub const DEFAULT_INPUT: &str = "foo bar";
