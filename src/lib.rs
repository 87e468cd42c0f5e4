/*!
 * cowpipe
 * Unidirectional pipes for wiring a forked child's standard streams,
 * plus a harness that shuttles bytes through an external command
 */

#[cfg(not(unix))]
compile_error!("cowpipe relies on fork, exec and dup2 and only builds on Unix targets");

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod process;

// Re-exports
pub use crate::core::{HarnessConfig, PipeEnd, StandardStream};
pub use ipc::{Pipe, PipeError, PipeResult};
pub use monitoring::init_tracing;
pub use process::{
    ChildSetup, CommandSpec, ExchangeMode, ExitReport, ForkLauncher, Harness, HarnessError,
    HarnessResult, LaunchError, LaunchResult, ProcessLauncher, Redirection, RunReport,
};
