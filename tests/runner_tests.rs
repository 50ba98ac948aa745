//! Tests for Command Execution and Error Handling
//!
//! These tests verify:
//! - Dry-run mode never reaches the launcher
//! - Exit codes pass through verbatim
//! - Launch failures map to the sentinel code
//! - Output is relayed line by line as it is read
//! - A child whose output cannot be relayed is stopped and reaped
//! - Real processes stream merged stdout/stderr

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, BufRead, Cursor, Read, Write};
use std::rc::Rc;

use fedora_postinstall::runner::{
    CommandRunner, CommandSpec, EXECUTION_FAILED, ProcessLauncher, RunningProcess,
};

// =============================================================================
// Test doubles
// =============================================================================

struct ScriptedProcess {
    output: Cursor<Vec<u8>>,
    code: Option<i32>,
}

impl RunningProcess for ScriptedProcess {
    fn output(&mut self) -> &mut dyn BufRead {
        &mut self.output
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.code)
    }
}

/// Fails the test if the runner ever tries to start a process.
struct PanickingLauncher;

impl ProcessLauncher for PanickingLauncher {
    fn launch(&self, argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        panic!("launcher must not be called in dry-run mode: {:?}", argv);
    }
}

struct FailingLauncher {
    calls: Cell<usize>,
}

impl ProcessLauncher for FailingLauncher {
    fn launch(&self, _argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        self.calls.set(self.calls.get() + 1);
        Err(io::Error::other("Simulated I/O error"))
    }
}

struct ScriptedLauncher {
    output: &'static str,
    code: Option<i32>,
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, _argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        Ok(Box::new(ScriptedProcess {
            output: Cursor::new(self.output.as_bytes().to_vec()),
            code: self.code,
        }))
    }
}

/// Shared record of what happened to a process after launch.
#[derive(Default)]
struct Lifecycle {
    killed: Cell<bool>,
    reaped_after_kill: Cell<bool>,
}

/// A process whose output stream breaks halfway.
struct BrokenPipeProcess {
    lifecycle: Rc<Lifecycle>,
}

impl RunningProcess for BrokenPipeProcess {
    fn output(&mut self) -> &mut dyn BufRead {
        self
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        if self.lifecycle.killed.get() {
            self.lifecycle.reaped_after_kill.set(true);
            return Ok(None);
        }
        Ok(Some(0))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.lifecycle.killed.set(true);
        Ok(())
    }
}

impl io::Read for BrokenPipeProcess {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }
}

impl BufRead for BrokenPipeProcess {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }

    fn consume(&mut self, _amt: usize) {}
}

#[derive(Default)]
struct BrokenPipeLauncher {
    lifecycle: Rc<Lifecycle>,
}

impl ProcessLauncher for BrokenPipeLauncher {
    fn launch(&self, _argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        Ok(Box::new(BrokenPipeProcess {
            lifecycle: Rc::clone(&self.lifecycle),
        }))
    }
}

/// Operator output that collects into a buffer the test can inspect while
/// the runner is still streaming.
#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Child output that only hands out the next line once every earlier line
/// is visible in the operator output.
struct LockstepOutput {
    pending: VecDeque<&'static str>,
    served: Vec<&'static str>,
    current: Vec<u8>,
    pos: usize,
    out: SharedOutput,
    late_lines: Rc<Cell<usize>>,
}

impl Read for LockstepOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for LockstepOutput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos == self.current.len() {
            if let Some(line) = self.pending.pop_front() {
                let seen = self.out.contents();
                let late = self
                    .served
                    .iter()
                    .filter(|earlier| !seen.contains(**earlier))
                    .count();
                self.late_lines.set(self.late_lines.get() + late);
                self.served.push(line.trim_end());
                self.current = line.as_bytes().to_vec();
                self.pos = 0;
            }
        }
        Ok(&self.current[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos += amt;
    }
}

struct LockstepProcess {
    output: LockstepOutput,
}

impl RunningProcess for LockstepProcess {
    fn output(&mut self) -> &mut dyn BufRead {
        &mut self.output
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(Some(0))
    }
}

struct LockstepLauncher {
    lines: &'static [&'static str],
    out: SharedOutput,
    late_lines: Rc<Cell<usize>>,
}

impl ProcessLauncher for LockstepLauncher {
    fn launch(&self, _argv: &[String]) -> io::Result<Box<dyn RunningProcess>> {
        Ok(Box::new(LockstepProcess {
            output: LockstepOutput {
                pending: self.lines.iter().copied().collect(),
                served: Vec::new(),
                current: Vec::new(),
                pos: 0,
                out: self.out.clone(),
                late_lines: Rc::clone(&self.late_lines),
            },
        }))
    }
}

/// Operator output that accepts status lines but rejects child output.
struct RejectingOutput;

impl Write for RejectingOutput {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "operator went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Dry-run
// =============================================================================

#[test]
fn test_dry_run_returns_zero_without_launching() {
    let runner = CommandRunner::with_launcher(true, PanickingLauncher);
    let mut out = Vec::new();

    let code = runner.run_command(&["sudo", "dnf", "install", "-y"], &["nano"], &mut out);

    assert_eq!(code, 0);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("sudo dnf install -y nano"));
    assert!(out.contains("Dry-run"));
}

#[test]
fn test_runners_are_independent() {
    let dry = CommandRunner::with_launcher(true, PanickingLauncher);
    let live = CommandRunner::with_launcher(
        false,
        ScriptedLauncher {
            output: "",
            code: Some(7),
        },
    );
    let mut out = Vec::new();

    assert!(dry.is_dry_run());
    assert!(!live.is_dry_run());
    assert_eq!(dry.run_command(&["true"], &[] as &[&str], &mut out), 0);
    assert_eq!(live.run_command(&["false"], &[] as &[&str], &mut out), 7);
}

// =============================================================================
// Live execution with test doubles
// =============================================================================

#[test]
fn test_launch_failure_returns_minus_one() {
    let runner = CommandRunner::with_launcher(
        false,
        FailingLauncher {
            calls: Cell::new(0),
        },
    );
    let mut out = Vec::new();

    let code = runner.run(&CommandSpec::new(["failing", "cmd"]), &mut out);

    assert_eq!(code, EXECUTION_FAILED);
    assert_eq!(runner.launcher().calls.get(), 1);
}

#[test]
fn test_streaming_failure_returns_minus_one() {
    let runner = CommandRunner::with_launcher(false, BrokenPipeLauncher::default());
    let mut out = Vec::new();

    assert_eq!(
        runner.run(&CommandSpec::new(["cat"]), &mut out),
        EXECUTION_FAILED
    );
}

#[test]
fn test_streaming_failure_kills_and_reaps_child() {
    let runner = CommandRunner::with_launcher(false, BrokenPipeLauncher::default());
    let mut out = Vec::new();

    let code = runner.run(&CommandSpec::new(["cat"]), &mut out);

    assert_eq!(code, EXECUTION_FAILED);
    let lifecycle = &runner.launcher().lifecycle;
    assert!(lifecycle.killed.get());
    assert!(lifecycle.reaped_after_kill.get());
    assert!(!String::from_utf8(out).unwrap().contains("Command exited with code"));
}

#[test]
fn test_each_line_is_written_before_the_next_is_read() {
    let out = SharedOutput::default();
    let late_lines = Rc::new(Cell::new(0));
    let runner = CommandRunner::with_launcher(
        false,
        LockstepLauncher {
            lines: &["Downloading packages...\n", "Installing nano\n", "Complete!\n"],
            out: out.clone(),
            late_lines: Rc::clone(&late_lines),
        },
    );
    let mut writer = out.clone();

    let code = runner.run_command(&["sudo", "dnf", "install", "-y"], &["nano"], &mut writer);

    assert_eq!(code, 0);
    assert_eq!(late_lines.get(), 0);
    let transcript = out.contents();
    assert!(transcript.contains("Downloading packages...\nInstalling nano\nComplete!\n"));
}

#[test]
fn test_two_lines_then_exit_three() {
    let runner = CommandRunner::with_launcher(
        false,
        ScriptedLauncher {
            output: "line one\nline two\n",
            code: Some(3),
        },
    );
    let mut out = Vec::new();

    let code = runner.run_command(&["tool"], &["--flag"], &mut out);

    assert_eq!(code, 3);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Executing shell command: tool --flag"));
    assert!(out.contains("line one\nline two\n"));
    assert!(out.contains("Command exited with code: 3"));
}

// =============================================================================
// Real processes
// =============================================================================

#[cfg(unix)]
#[test]
fn test_real_process_merges_stderr_and_returns_exit_code() {
    let runner = CommandRunner::new(false);
    let mut out = Vec::new();

    let code = runner.run_command(
        &["sh", "-c"],
        &["echo first; echo second >&2; exit 3"],
        &mut out,
    );

    assert_eq!(code, 3);
    let out = String::from_utf8(out).unwrap();
    let first = out.find("first").expect("stdout line echoed");
    let second = out.find("second").expect("stderr line echoed");
    assert!(first < second);
}

#[cfg(unix)]
#[test]
fn test_real_child_is_stopped_when_output_cannot_be_relayed() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("still-running");
    let script = format!("echo child-line; sleep 1; touch '{}'", marker.display());
    let runner = CommandRunner::new(false);

    let code = runner.run_command(&["sh", "-c"], &[script.as_str()], &mut RejectingOutput);

    assert_eq!(code, EXECUTION_FAILED);
    std::thread::sleep(std::time::Duration::from_secs(2));
    assert!(!marker.exists(), "child kept running after the runner gave up");
}

#[cfg(unix)]
#[test]
fn test_real_process_success() {
    let runner = CommandRunner::new(false);
    let mut out = Vec::new();

    assert_eq!(runner.run_command(&["true"], &[] as &[&str], &mut out), 0);
}

#[cfg(unix)]
#[test]
fn test_arguments_are_not_shell_interpreted() {
    let runner = CommandRunner::new(false);
    let mut out = Vec::new();

    let code = runner.run_command(&["echo"], &["a b", "$HOME", "; exit 9"], &mut out);

    assert_eq!(code, 0);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("a b $HOME ; exit 9\n"));
}

#[test]
fn test_missing_program_returns_minus_one() {
    let runner = CommandRunner::new(false);
    let mut out = Vec::new();

    let code = runner.run_command(
        &["this-program-does-not-exist-12345"],
        &[] as &[&str],
        &mut out,
    );

    assert_eq!(code, EXECUTION_FAILED);
}
