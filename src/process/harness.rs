/*!
 * Process Harness
 * Feeds bytes to an external command through its stdin and collects its stdout
 */

use super::launcher::ForkLauncher;
use super::traits::ProcessLauncher;
use super::types::{
    ChildSetup, ExchangeMode, HarnessError, HarnessResult, LaunchError, Redirection, RunReport,
};
use crate::core::config::HarnessConfig;
use crate::ipc::{Pipe, PipeResult};
use crate::monitoring::span_exchange;
use tracing::{debug, warn};

/// Runs one command per call: write input, read output, join the child
///
/// Callers see either the command's output or an empty buffer. An empty buffer
/// does not tell "fork failed" apart from "command printed nothing"; use
/// [`run_with_report`](Harness::run_with_report) when that matters.
#[derive(Debug, Clone)]
pub struct Harness<L: ProcessLauncher = ForkLauncher> {
    launcher: L,
    config: HarnessConfig,
}

impl Harness<ForkLauncher> {
    /// Harness backed by real processes
    pub fn fork(config: HarnessConfig) -> Self {
        Self::new(ForkLauncher::new(), config)
    }
}

impl<L: ProcessLauncher> Harness<L> {
    pub fn new(launcher: L, config: HarnessConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Pass `input` through the command and return everything it printed
    pub fn run(&self, input: impl AsRef<[u8]>) -> HarnessResult<Vec<u8>> {
        self.run_with_report(input).map(|(output, _)| output)
    }

    /// [`run`](Harness::run) for text, decoding the output lossily
    pub fn run_string(&self, input: &str) -> HarnessResult<String> {
        let output = self.run(input)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    pub fn run_with_report(&self, input: impl AsRef<[u8]>) -> HarnessResult<(Vec<u8>, RunReport)> {
        let input = input.as_ref();
        let command = &self.config.command;
        let span = span_exchange(&command.program);
        let _entered = span.enter();

        let mut report = RunReport {
            command: command.to_string(),
            mode: self.config.mode,
            launched: false,
            bytes_in: 0,
            bytes_out: 0,
            exit: None,
        };

        let mut input_pipe = Pipe::new()?;
        let mut output_pipe = Pipe::new()?;

        let setup = ChildSetup::new(command)
            .redirect(Redirection::stdin(&mut input_pipe))
            .redirect(Redirection::stdout(&mut output_pipe));

        let child = match self.launcher.launch(setup) {
            Ok(child) => child,
            Err(LaunchError::Fork { errno }) => {
                warn!(
                    trace_id = span.trace_id(),
                    command = %command,
                    error = %errno,
                    "Could not fork, returning empty output"
                );
                span.record_error(&errno.to_string());
                return Ok((Vec::new(), report));
            }
            Err(e) => {
                span.record_error(&e.to_string());
                return Err(e.into());
            }
        };
        report.launched = true;

        let exchanged = self.exchange(&mut input_pipe, &mut output_pipe, input);

        // The child must see end-of-input before we wait on it, even when the
        // exchange failed halfway.
        drop(input_pipe);
        drop(output_pipe);

        match self.launcher.join(child) {
            Ok(exit) => {
                debug!(?exit, "Child joined, exit status discarded");
                span.record_exit(exit);
                report.exit = Some(exit);
            }
            Err(e) => warn!(error = %e, "Could not join child"),
        }

        let (written, output) = exchanged.map_err(|e| {
            span.record_error(&e.to_string());
            e
        })?;

        if written < input.len() {
            debug!(
                written,
                requested = input.len(),
                "Command stopped reading before end of input"
            );
        }

        span.record_bytes_in(written);
        span.record_bytes_out(output.len());
        report.bytes_in = written;
        report.bytes_out = output.len();

        Ok((output, report))
    }

    /// Parent side of the exchange; returns (bytes written, output)
    fn exchange(
        &self,
        input_pipe: &mut Pipe,
        output_pipe: &mut Pipe,
        input: &[u8],
    ) -> HarnessResult<(usize, Vec<u8>)> {
        match self.config.mode {
            ExchangeMode::Sequential => {
                let written = feed(input_pipe, input)?;
                let output = output_pipe.read()?;
                Ok((written, output))
            }
            ExchangeMode::Concurrent => std::thread::scope(|scope| -> HarnessResult<_> {
                let writer = scope.spawn(move || feed(input_pipe, input));
                let output = drain(output_pipe);
                let written = writer.join().map_err(|_| HarnessError::WriterPanicked)??;
                Ok((written, output?))
            }),
        }
    }
}

/// Read all output, closing the pipe on failure so a child still writing sees
/// `EPIPE` and lets go of its stdin
fn drain(pipe: &mut Pipe) -> PipeResult<Vec<u8>> {
    pipe.read().map_err(|e| {
        let _ = pipe.close();
        e
    })
}

/// Write all input, then close so the child observes end-of-input
fn feed(pipe: &mut Pipe, input: &[u8]) -> PipeResult<usize> {
    let written = pipe.write(input)?;
    pipe.close()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::KERNEL_PIPE_CAPACITY;
    use crate::core::types::{PipeEnd, StandardStream};
    use crate::ipc::PipeError;
    use crate::process::types::{CommandSpec, ExitReport, LaunchResult};
    use nix::errno::Errno;
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::fs::File;
    use std::io::{Read, Write};
    use std::thread::JoinHandle;

    /// Runs the "child" on a thread: uppercases stdin into stdout
    struct ThreadLauncher;

    impl ProcessLauncher for ThreadLauncher {
        type Child = JoinHandle<()>;

        fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<Self::Child> {
            let mut stdin = None;
            let mut stdout = None;
            for redirection in setup.redirections {
                let fd = redirection
                    .pipe
                    .take(redirection.end)
                    .ok_or_else(|| LaunchError::Simulated("end already taken".into()))?;
                match redirection.stream {
                    StandardStream::Stdin => stdin = Some(File::from(fd)),
                    _ => stdout = Some(File::from(fd)),
                }
            }
            let (mut stdin, mut stdout) = stdin
                .zip(stdout)
                .ok_or_else(|| LaunchError::Simulated("missing stream".into()))?;

            Ok(std::thread::spawn(move || {
                let mut buffer = Vec::new();
                stdin.read_to_end(&mut buffer).unwrap();
                stdout.write_all(&buffer.to_ascii_uppercase()).unwrap();
            }))
        }

        fn join(&self, child: Self::Child) -> LaunchResult<ExitReport> {
            child.join().unwrap();
            Ok(ExitReport::Exited(0))
        }
    }

    /// Child that never reads stdin and writes stdout until its reader is gone
    ///
    /// The parent's read end is switched to non-blocking so draining fails
    /// with `EAGAIN` while the child is still running.
    struct StalledLauncher;

    impl ProcessLauncher for StalledLauncher {
        type Child = JoinHandle<()>;

        fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<Self::Child> {
            let mut stdin = None;
            let mut stdout = None;
            for redirection in setup.redirections {
                let fd = redirection
                    .pipe
                    .take(redirection.end)
                    .ok_or_else(|| LaunchError::Simulated("end already taken".into()))?;
                match redirection.stream {
                    StandardStream::Stdin => stdin = Some(File::from(fd)),
                    _ => {
                        if let Some(read_fd) = redirection.pipe.raw_fd(PipeEnd::Read) {
                            fcntl(read_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
                                .map_err(|e| LaunchError::Simulated(e.to_string()))?;
                        }
                        stdout = Some(File::from(fd));
                    }
                }
            }
            let (stdin, mut stdout) = stdin
                .zip(stdout)
                .ok_or_else(|| LaunchError::Simulated("missing stream".into()))?;

            Ok(std::thread::spawn(move || {
                let _stdin = stdin;
                while stdout.write_all(&[b'z'; 512]).is_ok() {}
            }))
        }

        fn join(&self, child: Self::Child) -> LaunchResult<ExitReport> {
            child.join().unwrap();
            Ok(ExitReport::Exited(0))
        }
    }

    /// Fails every fork and records whether join was attempted
    #[derive(Default)]
    struct FailingLauncher {
        saw_open_pipes: Cell<bool>,
        joined: Cell<bool>,
    }

    impl ProcessLauncher for FailingLauncher {
        type Child = ();

        fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<()> {
            let all_open = setup.redirections.iter().all(|r| {
                r.pipe.is_open(PipeEnd::Read) && r.pipe.is_open(PipeEnd::Write)
            });
            self.saw_open_pipes.set(all_open);
            Err(LaunchError::Fork {
                errno: Errno::EAGAIN,
            })
        }

        fn join(&self, _child: ()) -> LaunchResult<ExitReport> {
            self.joined.set(true);
            Ok(ExitReport::Unknown)
        }
    }

    fn config() -> HarnessConfig {
        HarnessConfig::new(CommandSpec::new("upcase"))
    }

    #[test]
    fn test_thread_launcher_round_trip() {
        let harness = Harness::new(ThreadLauncher, config());
        assert_eq!(harness.run_string("foo bar").unwrap(), "FOO BAR");
    }

    #[test]
    fn test_concurrent_mode_round_trip() {
        let harness = Harness::new(
            ThreadLauncher,
            config().with_mode(ExchangeMode::Concurrent),
        );
        let input = vec![b'a'; 200_000];
        let output = harness.run(&input).unwrap();
        assert_eq!(output.len(), input.len());
        assert!(output.iter().all(|&b| b == b'A'));
    }

    #[test]
    fn test_failed_drain_closes_output_pipe() {
        let mut output = Pipe::new().unwrap();
        let mut child_stdout = File::from(output.take(PipeEnd::Write).unwrap());
        let read_fd = output.raw_fd(PipeEnd::Read).unwrap();
        fcntl(read_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).unwrap();

        assert!(matches!(drain(&mut output), Err(PipeError::Read { .. })));
        assert!(output.is_inert());

        let err = child_stdout.write_all(b"late").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_concurrent_read_failure_releases_writer() {
        let harness = Harness::new(
            StalledLauncher,
            config().with_mode(ExchangeMode::Concurrent),
        );
        // Larger than a kernel pipe buffer, so the writer blocks on the
        // unread stdin until the child gives up
        let input = vec![b'a'; KERNEL_PIPE_CAPACITY * 4];

        assert!(matches!(
            harness.run(&input),
            Err(HarnessError::Pipe(PipeError::Read { .. }))
        ));
    }

    #[test]
    fn test_fork_failure_returns_empty_without_io() {
        let launcher = FailingLauncher::default();
        let harness = Harness::new(&launcher, config());

        let (output, report) = harness.run_with_report("ignored").unwrap();

        assert!(output.is_empty());
        assert!(!report.launched);
        assert_eq!(report.bytes_in, 0);
        assert_eq!(report.exit, None);
        assert!(launcher.saw_open_pipes.get());
        assert!(!launcher.joined.get());
    }

    #[test]
    fn test_other_launch_errors_propagate() {
        struct Refusing;
        impl ProcessLauncher for Refusing {
            type Child = ();
            fn launch(&self, _setup: ChildSetup<'_>) -> LaunchResult<()> {
                Err(LaunchError::InvalidCommand("nope".into()))
            }
            fn join(&self, _child: ()) -> LaunchResult<ExitReport> {
                unreachable!("never launched")
            }
        }

        let harness = Harness::new(Refusing, config());
        assert!(matches!(
            harness.run("x"),
            Err(HarnessError::Launch(LaunchError::InvalidCommand(_)))
        ));
    }

    #[test]
    fn test_report_counts_bytes() {
        let harness = Harness::new(ThreadLauncher, config());
        let (output, report) = harness.run_with_report("abc").unwrap();
        assert_eq!(output, b"ABC");
        assert!(report.launched);
        assert_eq!(report.bytes_in, 3);
        assert_eq!(report.bytes_out, 3);
        assert_eq!(report.exit, Some(ExitReport::Exited(0)));
        assert_eq!(report.command, "upcase");
    }
}
