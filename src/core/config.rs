/*!
 * Harness Configuration
 * Serde-backed settings with environment overrides
 */

use super::limits::DEFAULT_PROGRAM;
use crate::process::{CommandSpec, ExchangeMode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Program override (looked up on PATH)
pub const ENV_COMMAND: &str = "COWPIPE_COMMAND";
/// Whitespace separated argument override
pub const ENV_ARGS: &str = "COWPIPE_ARGS";
/// `sequential` or `concurrent`
pub const ENV_MODE: &str = "COWPIPE_MODE";

/// Settings for a [`Harness`](crate::process::Harness)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct HarnessConfig {
    pub command: CommandSpec,
    pub mode: ExchangeMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command: CommandSpec::new(DEFAULT_PROGRAM),
            mode: ExchangeMode::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ExchangeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Defaults with `COWPIPE_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment, map, ...)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_COMMAND).filter(|p| !p.trim().is_empty()) {
            self.command = CommandSpec::new(program.trim());
        }

        if let Some(args) = lookup(ENV_ARGS) {
            self.command.args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Some(mode) = lookup(ENV_MODE) {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => warn!(value = %mode, error = %e, "Ignoring invalid exchange mode"),
            }
        }

        self
    }
}
