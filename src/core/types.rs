/*!
 * Core Types
 * Descriptor-level vocabulary shared by pipes and launchers
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::fd::RawFd;

/// One of the two ends of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeEnd {
    Read,
    Write,
}

impl fmt::Display for PipeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeEnd::Read => f.write_str("read end"),
            PipeEnd::Write => f.write_str("write end"),
        }
    }
}

/// A standard stream slot that a pipe end can be redirected onto
///
/// The slot is identified by its well-known descriptor number and is never
/// owned by a pipe; attaching overwrites whatever it referenced before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StandardStream {
    #[inline]
    pub fn raw_fd(self) -> RawFd {
        match self {
            StandardStream::Stdin => 0,
            StandardStream::Stdout => 1,
            StandardStream::Stderr => 2,
        }
    }

    /// The pipe end that makes sense to attach here
    ///
    /// A process reads its stdin and writes its stdout/stderr.
    #[inline]
    pub fn natural_end(self) -> PipeEnd {
        match self {
            StandardStream::Stdin => PipeEnd::Read,
            StandardStream::Stdout | StandardStream::Stderr => PipeEnd::Write,
        }
    }
}

impl fmt::Display for StandardStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StandardStream::Stdin => f.write_str("stdin"),
            StandardStream::Stdout => f.write_str("stdout"),
            StandardStream::Stderr => f.write_str("stderr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_stream_descriptors() {
        assert_eq!(StandardStream::Stdin.raw_fd(), 0);
        assert_eq!(StandardStream::Stdout.raw_fd(), 1);
        assert_eq!(StandardStream::Stderr.raw_fd(), 2);
    }

    #[test]
    fn test_natural_end() {
        assert_eq!(StandardStream::Stdin.natural_end(), PipeEnd::Read);
        assert_eq!(StandardStream::Stdout.natural_end(), PipeEnd::Write);
        assert_eq!(StandardStream::Stderr.natural_end(), PipeEnd::Write);
    }
}
