//! Spawning the program under test.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Captured result of one launch. Streams are returned verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl Invocation {
    /// A launch that never got as far as running the program.
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: 1,
        }
    }
}

/// Runs one case to completion. Implementations must not fail: a launch
/// problem is reported as exit code 1 with the reason on stderr.
pub trait Launcher {
    fn invoke(&self, executable: &Path, num_processes: u32, problem_size: u32) -> Invocation;
}

/// `<program> -np <N> --oversubscribe <executable> <size>`, run from the
/// project root and waited on synchronously.
#[derive(Debug, Clone)]
pub struct MpiLauncher {
    pub program: String,
    pub working_dir: PathBuf,
}

impl MpiLauncher {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn command(&self, executable: &Path, num_processes: u32, problem_size: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-np")
            .arg(num_processes.to_string())
            .arg("--oversubscribe")
            .arg(executable)
            .arg(problem_size.to_string())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Launcher for MpiLauncher {
    fn invoke(&self, executable: &Path, num_processes: u32, problem_size: u32) -> Invocation {
        let mut cmd = self.command(executable, num_processes, problem_size);
        debug!(?cmd, "spawning case");
        match cmd.output() {
            Ok(output) => Invocation {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: exit_code(&output.status),
            },
            Err(e) => Invocation::launch_failure(format!(
                "failed to launch {}: {}",
                self.program, e
            )),
        }
    }
}

/// Exit code, or the negated signal number when the child was killed.
#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
