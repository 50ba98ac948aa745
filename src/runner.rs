//! External command execution
//!
//! `CommandRunner` is the only way the workflow starts a process. Every
//! invocation follows the same path:
//!
//! - the assembled command line is printed so the operator can audit it
//! - in dry-run mode nothing else happens and `0` is returned
//! - otherwise the child runs with stderr merged into stdout, its output is
//!   echoed line by line as it arrives, and its exit code is returned
//!
//! # Failure Policy
//!
//! Execution failures are **non-fatal**. Any I/O failure between spawning
//! the child and collecting its status is logged on the error channel with
//! the [`RunPhase`] it happened in, and reported as [`EXECUTION_FAILED`].
//!
//! # Arguments
//!
//! Arguments are handed to the OS launcher as an argument vector. Nothing is
//! passed through a shell, so spaces and metacharacters in package names are
//! never re-parsed.

use std::fmt;
use std::io::{self, BufRead, BufReader, PipeReader, Write};
use std::process::{Child, Command, Stdio};

use strum::Display;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::theme::{Palette, Tone};

/// Returned when the exit status is unknown because execution broke down.
pub const EXECUTION_FAILED: i32 = -1;

/// Fixed prefix tokens followed by dynamic trailing tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    prefix: Vec<String>,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.into_iter().map(Into::into).collect(),
            args: Vec::new(),
        }
    }

    /// Append trailing tokens after the prefix.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The literal argument vector: prefix, then trailing tokens.
    pub fn argv(&self) -> Vec<String> {
        self.prefix.iter().chain(&self.args).cloned().collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// A started child process.
pub trait RunningProcess {
    /// Combined stdout/stderr stream of the child.
    fn output(&mut self) -> &mut dyn BufRead;

    /// Block until the child exits. `None` means it exited without a code
    /// (killed by a signal).
    fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Forcibly stop the child. Callers still `wait` afterwards to reap it.
    fn kill(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Starts processes from an argument vector.
///
/// The runner never calls this in dry-run mode, which makes it the seam for
/// test doubles.
pub trait ProcessLauncher {
    fn launch(&self, argv: &[String]) -> io::Result<Box<dyn RunningProcess>>;
}

/// Launches real OS processes with stderr redirected into stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let (reader, writer) = io::pipe()?;
        let child = {
            let mut cmd = Command::new(program);
            cmd.args(args)
                .stdin(Stdio::inherit())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            // `cmd` owns the parent's copies of the write end; dropping it at
            // the end of this block lets the reader see EOF when the child exits.
            cmd.spawn()?
        };
        debug!("Spawned {} (pid {})", program, child.id());

        Ok(Box::new(SystemProcess {
            child,
            output: BufReader::new(reader),
        }))
    }
}

struct SystemProcess {
    child: Child,
    output: BufReader<PipeReader>,
}

impl RunningProcess for SystemProcess {
    fn output(&mut self) -> &mut dyn BufRead {
        &mut self.output
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait()?.code())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }
}

/// Where an invocation was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunPhase {
    #[strum(serialize = "starting")]
    Starting,
    #[strum(serialize = "streaming output")]
    Streaming,
    #[strum(serialize = "waiting for exit")]
    WaitingForExit,
}

#[derive(Debug, Error)]
#[error("failed while {phase}: {source}")]
struct ExecutionFailure {
    phase: RunPhase,
    source: io::Error,
}

impl ExecutionFailure {
    fn at(phase: RunPhase) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { phase, source }
    }
}

/// Runs or simulates external commands for one session.
#[derive(Debug, Clone)]
pub struct CommandRunner<L = SystemLauncher> {
    dry_run: bool,
    launcher: L,
    palette: Palette,
}

impl CommandRunner<SystemLauncher> {
    pub fn new(dry_run: bool) -> Self {
        Self::with_launcher(dry_run, SystemLauncher)
    }
}

impl<L: ProcessLauncher> CommandRunner<L> {
    pub fn with_launcher(dry_run: bool, launcher: L) -> Self {
        Self {
            dry_run,
            launcher,
            palette: Palette::plain(),
        }
    }

    /// Color command lines and output with `palette`.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run `prefix` followed by `args`. See [`CommandRunner::run`].
    pub fn run_command<P, A>(&self, prefix: &[P], args: &[A], out: &mut dyn Write) -> i32
    where
        P: AsRef<str>,
        A: AsRef<str>,
    {
        let spec = CommandSpec::new(prefix.iter().map(AsRef::as_ref))
            .with_args(args.iter().map(AsRef::as_ref));
        self.run(&spec, out)
    }

    /// Run `spec`, echoing everything to `out`.
    ///
    /// Returns `0` in dry-run mode, the child's exit code otherwise, or
    /// [`EXECUTION_FAILED`] when the command could not be run to completion.
    pub fn run(&self, spec: &CommandSpec, out: &mut dyn Write) -> i32 {
        let line = spec.to_string();
        announce(
            out,
            &format!(
                "Executing shell command: {}",
                self.palette.paint(&line, Tone::Info)
            ),
        );

        if self.dry_run {
            info!("Dry run, skipped: {}", line);
            announce(
                out,
                &self
                    .palette
                    .paint("Dry-run: command not executed.", Tone::Warning),
            );
            return 0;
        }

        match self.execute(spec, out) {
            Ok(code) => {
                info!("Command `{}` exited with code {}", line, code);
                announce(out, &format!("Command exited with code: {}", code));
                code
            }
            Err(e) => {
                error!("Error while running command `{}`: {}", line, e);
                EXECUTION_FAILED
            }
        }
    }

    fn execute(
        &self,
        spec: &CommandSpec,
        out: &mut dyn Write,
    ) -> Result<i32, ExecutionFailure> {
        let mut process = self
            .launcher
            .launch(&spec.argv())
            .map_err(ExecutionFailure::at(RunPhase::Starting))?;

        announce(out, "Command output:");
        if let Err(e) = self.stream_output(process.output(), out) {
            abandon(process.as_mut());
            return Err(ExecutionFailure::at(RunPhase::Streaming)(e));
        }

        process
            .wait()
            .map_err(ExecutionFailure::at(RunPhase::WaitingForExit))?
            .ok_or_else(|| ExecutionFailure {
                phase: RunPhase::WaitingForExit,
                source: io::Error::other("process terminated without an exit code"),
            })
    }

    /// Copy the child's output to `out` one line at a time, flushing after
    /// each so long-running commands show progress.
    fn stream_output(&self, output: &mut dyn BufRead, out: &mut dyn Write) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if output.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim_end_matches(['\n', '\r']);
            writeln!(out, "{}", self.palette.paint(text, Tone::Warning))?;
            out.flush()?;
        }
    }
}

/// Stop and reap a child whose output can no longer be relayed, so it is
/// gone before the next command starts.
fn abandon(process: &mut dyn RunningProcess) {
    if let Err(e) = process.kill() {
        debug!("Failed to kill abandoned child: {}", e);
    }
    match process.wait() {
        Ok(code) => debug!("Abandoned child reaped (exit code {:?})", code),
        Err(e) => debug!("Failed to reap abandoned child: {}", e),
    }
}

/// Best-effort status line. A broken operator stream only matters once the
/// child is producing output.
fn announce(out: &mut dyn Write, message: &str) {
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        debug!("Failed to write status line: {}", e);
    }
}
