/*!
 * Process Traits
 * Process launch abstraction
 */

use super::types::*;

/// Capability to start a child wired to pipes, and to wait for it
///
/// Starting a process replaces global state on the host, so the harness only
/// talks to this trait. Tests substitute a launcher that runs the "child" on a
/// thread or fails on purpose.
pub trait ProcessLauncher {
    /// Opaque handle consumed exactly once by [`join`](ProcessLauncher::join)
    type Child;

    /// Start the child described by `setup`
    ///
    /// On success the child owns the redirected ends; the parent still holds
    /// its copies until its own pipe operations close them.
    fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<Self::Child>;

    /// Block until the child terminates
    fn join(&self, child: Self::Child) -> LaunchResult<ExitReport>;
}

impl<L: ProcessLauncher + ?Sized> ProcessLauncher for &L {
    type Child = L::Child;

    fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<Self::Child> {
        (**self).launch(setup)
    }

    fn join(&self, child: Self::Child) -> LaunchResult<ExitReport> {
        (**self).join(child)
    }
}
