/*!
 * Pipe Implementation
 * Owned read/write descriptor pair backed by a single kernel pipe
 */

use super::types::{PipeError, PipeResult};
use crate::core::limits::TRANSFER_BUFFER_SIZE;
use crate::core::types::{PipeEnd, StandardStream};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::{close, dup2};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use tracing::debug;

/// Unidirectional byte pipe with one owned handle per end
///
/// A slot is `Some` while the end is open and becomes `None` exactly once,
/// when the end is closed, taken or attached. Dropping the pipe releases
/// whatever is still open.
///
/// A process should only ever use one direction: [`read`](Pipe::read) closes
/// the write end first and [`write`](Pipe::write) closes the read end first,
/// otherwise end-of-stream is never observed.
pub struct Pipe {
    reader: Option<File>,
    writer: Option<File>,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("read_fd", &self.raw_fd(PipeEnd::Read))
            .field("write_fd", &self.raw_fd(PipeEnd::Write))
            .finish()
    }
}

impl Pipe {
    /// Allocate one kernel pipe
    ///
    /// Both descriptors are close-on-exec. Redirecting an end onto a standard
    /// stream with [`attach`](Pipe::attach) produces a descriptor without the
    /// flag, so only attached ends survive into an exec'd program.
    pub fn new() -> PipeResult<Self> {
        let (read, write) = allocate().map_err(|errno| PipeError::Create { errno })?;

        debug!(
            read_fd = read.as_raw_fd(),
            write_fd = write.as_raw_fd(),
            "Pipe created"
        );

        Ok(Self {
            reader: Some(File::from(read)),
            writer: Some(File::from(write)),
        })
    }

    fn slot(&self, end: PipeEnd) -> &Option<File> {
        match end {
            PipeEnd::Read => &self.reader,
            PipeEnd::Write => &self.writer,
        }
    }

    fn slot_mut(&mut self, end: PipeEnd) -> &mut Option<File> {
        match end {
            PipeEnd::Read => &mut self.reader,
            PipeEnd::Write => &mut self.writer,
        }
    }

    #[inline]
    pub fn is_open(&self, end: PipeEnd) -> bool {
        self.slot(end).is_some()
    }

    /// Both ends closed; nothing left to do with this pipe
    #[inline]
    pub fn is_inert(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }

    pub fn raw_fd(&self, end: PipeEnd) -> Option<RawFd> {
        self.slot(end).as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Move one end out of the pipe
    ///
    /// The pipe no longer has any claim on the descriptor; the slot reads as
    /// closed from now on.
    pub fn take(&mut self, end: PipeEnd) -> Option<OwnedFd> {
        self.slot_mut(end).take().map(OwnedFd::from)
    }

    /// Redirect `end` onto `stream`, then close both of the pipe's own ends
    ///
    /// The standard stream's previous descriptor is released by `dup2`. After
    /// this call the pipe is inert and the live data path belongs to the
    /// stream slot. Safe to call between `fork` and `exec`: no allocation and
    /// no logging happen here.
    pub fn attach(&mut self, end: PipeEnd, stream: StandardStream) -> PipeResult<()> {
        let fd = self.raw_fd(end).ok_or(PipeError::EndClosed(end))?;
        let target = stream.raw_fd();

        if fd == target {
            // dup2 onto itself is a no-op and keeps close-on-exec, so hand the
            // descriptor over as is instead of closing it below.
            fcntl(target, FcntlArg::F_SETFD(FdFlag::empty())).map_err(|errno| {
                PipeError::Duplicate {
                    fd,
                    target: stream,
                    errno,
                }
            })?;
            if let Some(owned) = self.take(end) {
                let _ = owned.into_raw_fd();
            }
        } else {
            dup2(fd, target).map_err(|errno| PipeError::Duplicate {
                fd,
                target: stream,
                errno,
            })?;
        }

        self.close()
    }

    /// Drain the read end until end-of-stream
    ///
    /// Closes the write end first. Interrupted reads are retried. Calling it
    /// again after the stream is drained returns an empty buffer.
    pub fn read(&mut self) -> PipeResult<Vec<u8>> {
        let mut output = Vec::new();
        self.read_into(&mut output)?;
        Ok(output)
    }

    /// Same loop as [`read`](Pipe::read), forwarding each chunk into `sink`
    pub fn read_into<W: Write + ?Sized>(&mut self, sink: &mut W) -> PipeResult<usize> {
        self.close_write()?;
        let reader = self
            .reader
            .as_mut()
            .ok_or(PipeError::EndClosed(PipeEnd::Read))?;

        let mut buffer = [0u8; TRANSFER_BUFFER_SIZE];
        let mut total = 0;

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => {
                    sink.write_all(&buffer[..count])
                        .map_err(|source| PipeError::Sink { source })?;
                    total += count;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(PipeError::Read { source }),
            }
        }

        debug!(bytes = total, "Pipe drained to end-of-stream");
        Ok(total)
    }

    /// Write all of `data` into the write end
    ///
    /// Closes the read end first. Returns the number of bytes transferred,
    /// which is short only when the reader went away (zero-length write or
    /// `EPIPE`); that case is best effort and not an error here.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> PipeResult<usize> {
        let data = data.as_ref();
        self.close_read()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or(PipeError::EndClosed(PipeEnd::Write))?;

        let mut transferred = 0;
        while transferred < data.len() {
            match writer.write(&data[transferred..]) {
                Ok(0) => break,
                Ok(count) => transferred += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(
                        transferred,
                        requested = data.len(),
                        "Pipe reader closed before write completed"
                    );
                    break;
                }
                Err(source) => return Err(PipeError::Write { source }),
            }
        }

        Ok(transferred)
    }

    /// Close one end if it is still open
    pub fn close_end(&mut self, end: PipeEnd) -> PipeResult<()> {
        let Some(file) = self.slot_mut(end).take() else {
            return Ok(());
        };

        match close(file.into_raw_fd()) {
            // Linux releases the descriptor even when close is interrupted
            Ok(()) | Err(Errno::EINTR) => Ok(()),
            Err(errno) => Err(PipeError::Close { end, errno }),
        }
    }

    #[inline]
    pub fn close_read(&mut self) -> PipeResult<()> {
        self.close_end(PipeEnd::Read)
    }

    #[inline]
    pub fn close_write(&mut self) -> PipeResult<()> {
        self.close_end(PipeEnd::Write)
    }

    /// Close write end then read end; idempotent
    pub fn close(&mut self) -> PipeResult<()> {
        let write = self.close_write();
        let read = self.close_read();
        write.and(read)
    }
}

#[cfg(target_os = "linux")]
fn allocate() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(target_os = "linux"))]
fn allocate() -> nix::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}
