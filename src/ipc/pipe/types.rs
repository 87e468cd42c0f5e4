/*!
 * Pipe Types
 * Errors and result alias for descriptor-backed pipes
 */

use crate::core::types::{PipeEnd, StandardStream};
use nix::errno::Errno;
use std::os::fd::RawFd;
use thiserror::Error;

pub type PipeResult<T> = Result<T, PipeError>;

/// Pipe error types
///
/// Every variant names the failing operation; syscall variants also carry the
/// raw result code and the platform's description of it.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("pipe() failed with code {}: {}", *errno as i32, errno.desc())]
    Create {
        #[source]
        errno: Errno,
    },

    #[error("dup2({fd}, {target}) failed with code {}: {}", *errno as i32, errno.desc())]
    Duplicate {
        fd: RawFd,
        target: StandardStream,
        #[source]
        errno: Errno,
    },

    #[error("read() failed with code {}: {source}", source.raw_os_error().unwrap_or(-1))]
    Read { source: std::io::Error },

    #[error("write() failed with code {}: {source}", source.raw_os_error().unwrap_or(-1))]
    Write { source: std::io::Error },

    #[error("forwarding drained bytes failed: {source}")]
    Sink { source: std::io::Error },

    #[error("close() of {end} failed with code {}: {}", *errno as i32, errno.desc())]
    Close {
        end: PipeEnd,
        #[source]
        errno: Errno,
    },

    #[error("Pipe {0} already closed")]
    EndClosed(PipeEnd),
}
