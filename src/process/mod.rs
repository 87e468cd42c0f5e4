/*!
 * Process Module
 * Launching a child wired to pipes and exchanging bytes with it
 */

pub mod harness;
pub mod launcher;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use harness::Harness;
pub use launcher::ForkLauncher;
pub use traits::ProcessLauncher;
pub use types::{
    ChildSetup, CommandSpec, ExchangeMode, ExitReport, HarnessError, HarnessResult, LaunchError,
    LaunchResult, ParseModeError, Redirection, RunReport,
};
