/*!
 * Process Types
 * Command descriptions, child wiring, and launch/harness errors
 */

use crate::core::types::{PipeEnd, StandardStream};
use crate::ipc::{Pipe, PipeError};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Launch operation result
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Harness operation result
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Launch errors
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("fork() failed with code {}: {}", *errno as i32, errno.desc())]
    Fork { errno: Errno },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("waitpid() failed with code {}: {}", *errno as i32, errno.desc())]
    Wait { errno: Errno },

    #[error("Simulated launch failure: {0}")]
    Simulated(String),
}

/// Harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("Writer thread panicked")]
    WriterPanicked,
}

/// External program plus its arguments
///
/// `program` is resolved through `PATH` and also becomes `argv[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CommandSpec {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the exec argument vector, `argv[0]` included
    pub fn to_argv(&self) -> LaunchResult<Vec<CString>> {
        if self.program.trim().is_empty() {
            return Err(LaunchError::InvalidCommand("Empty command".to_string()));
        }

        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| {
                    LaunchError::InvalidCommand(format!("{:?} contains a NUL byte", arg))
                })
            })
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One pipe end to redirect onto one of the child's standard streams
#[derive(Debug)]
pub struct Redirection<'p> {
    pub pipe: &'p mut Pipe,
    pub end: PipeEnd,
    pub stream: StandardStream,
}

impl<'p> Redirection<'p> {
    /// Redirect the end of `pipe` that fits `stream` onto it
    pub fn new(pipe: &'p mut Pipe, stream: StandardStream) -> Self {
        Self {
            pipe,
            end: stream.natural_end(),
            stream,
        }
    }

    /// Feed the child's stdin from `pipe`
    pub fn stdin(pipe: &'p mut Pipe) -> Self {
        Self::new(pipe, StandardStream::Stdin)
    }

    /// Collect the child's stdout into `pipe`
    pub fn stdout(pipe: &'p mut Pipe) -> Self {
        Self::new(pipe, StandardStream::Stdout)
    }

    /// Collect the child's stderr into `pipe`
    pub fn stderr(pipe: &'p mut Pipe) -> Self {
        Self::new(pipe, StandardStream::Stderr)
    }
}

/// Everything the child side needs: what to run and how to wire it
#[derive(Debug)]
pub struct ChildSetup<'p> {
    pub command: &'p CommandSpec,
    pub redirections: Vec<Redirection<'p>>,
}

impl<'p> ChildSetup<'p> {
    pub fn new(command: &'p CommandSpec) -> Self {
        Self {
            command,
            redirections: Vec::new(),
        }
    }

    pub fn redirect(mut self, redirection: Redirection<'p>) -> Self {
        self.redirections.push(redirection);
        self
    }
}

/// How a child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ExitReport {
    Exited(i32),
    Signaled(i32),
    Unknown,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        matches!(self, ExitReport::Exited(0))
    }
}

/// Ordering of the parent's write and read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeMode {
    /// Write all input, then read all output
    ///
    /// Deadlocks if the command emits more than a kernel pipe buffer of
    /// output before it has consumed all of its input.
    #[default]
    Sequential,
    /// Write from a separate thread while reading on the caller's thread
    Concurrent,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown exchange mode: {0}")]
pub struct ParseModeError(String);

impl FromStr for ExchangeMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExchangeMode::Sequential),
            "concurrent" => Ok(ExchangeMode::Concurrent),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Summary of a single harness run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunReport {
    pub command: String,
    pub mode: ExchangeMode,
    /// False when fork failed and no I/O happened
    pub launched: bool,
    pub bytes_in: usize,
    pub bytes_out: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitReport>,
}
