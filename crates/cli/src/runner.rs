//! Execution of the wrapped credential command

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// Exit code reported when the wrapped command cannot be started
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Result of running the wrapped command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code of the command (`128 + signal` if it was killed)
    pub code: i32,
    /// Everything the command wrote to stdout
    pub stdout: Vec<u8>,
}

impl RunOutput {
    /// Whether the command exited successfully
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Why a wrapped command produced no [`RunOutput`]
#[derive(Error, Debug)]
pub enum RunError {
    /// The command could not be started
    #[error("failed to start: {0}")]
    Spawn(#[source] io::Error),
    /// The command started but its stdout could not be read or forwarded
    #[error("failed to relay output: {0}")]
    Relay(#[source] io::Error),
}

/// Runs a wrapped command, mirroring its stdout into `out` while capturing it
pub trait CommandRunner {
    /// Run `command` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Spawn`] if the command cannot be started and
    /// [`RunError::Relay`] if its output cannot be relayed. A command that
    /// runs and exits non-zero is not an error.
    fn run(&self, command: &str, args: &[String], out: &mut dyn Write)
    -> Result<RunOutput, RunError>;
}

/// Runs commands as child processes of the wrapper.
///
/// stdin and stderr are inherited so the command can prompt for MFA codes or
/// SSO logins; stdout is piped, copied to `out` as it arrives and kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        command: &str,
        args: &[String],
        out: &mut dyn Write,
    ) -> Result<RunOutput, RunError> {
        tracing::debug!(command, ?args, "Spawning wrapped command");

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(RunError::Spawn)?;

        let mut captured = Vec::new();
        let copied = match child.stdout.take() {
            Some(mut pipe) => tee(&mut pipe, out, &mut captured),
            None => Ok(()),
        };
        // Reap the child before surfacing a relay error.
        let status = child.wait().map_err(RunError::Relay)?;
        copied.map_err(RunError::Relay)?;

        let code = exit_code(status);
        tracing::debug!(command, code, bytes = captured.len(), "Wrapped command finished");
        Ok(RunOutput {
            code,
            stdout: captured,
        })
    }
}

fn tee(source: &mut impl Read, out: &mut dyn Write, captured: &mut Vec<u8>) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        out.flush()?;
        captured.extend_from_slice(&buf[..n]);
    }
    Ok(())
}

/// Map an exit status to a shell-style exit code
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Accepts nothing, like a stdout whose reader has gone away
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sh(script: &str, out: &mut Vec<u8>) -> Result<RunOutput, RunError> {
        SystemRunner.run("sh", &["-c".to_string(), script.to_string()], out)
    }

    #[test]
    fn captures_and_mirrors_stdout() {
        let mut out = Vec::new();
        let result = sh("printf 'line one\\nline two'", &mut out).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, b"line one\nline two");
        assert_eq!(out, result.stdout);
    }

    #[test]
    fn stderr_is_not_captured() {
        let mut out = Vec::new();
        let result = sh("echo token; echo progress >&2", &mut out).unwrap();
        assert_eq!(result.stdout, b"token\n");
    }

    #[test]
    fn propagates_exit_code() {
        let mut out = Vec::new();
        let result = sh("echo partial; exit 42", &mut out).unwrap();
        assert_eq!(result.code, 42);
        assert!(!result.success());
        assert_eq!(result.stdout, b"partial\n");
    }

    #[test]
    fn signal_maps_to_128_plus_signo() {
        let mut out = Vec::new();
        let result = sh("kill -TERM $$", &mut out).unwrap();
        assert_eq!(result.code, 128 + 15);
    }

    #[test]
    fn passes_arguments_verbatim() {
        let mut out = Vec::new();
        let args = vec![
            "-c".to_string(),
            "printf '%s|' \"$@\"".to_string(),
            "sh".to_string(),
            "--region".to_string(),
            "us-west-2".to_string(),
            "a b".to_string(),
        ];
        let result = SystemRunner.run("sh", &args, &mut out).unwrap();
        assert_eq!(result.stdout, b"--region|us-west-2|a b|");
    }

    #[test]
    fn missing_command_is_a_spawn_error() {
        let mut out = Vec::new();
        let err = SystemRunner
            .run("kubecredcache-definitely-not-installed", &[], &mut out)
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn closed_output_is_a_relay_error() {
        let err = SystemRunner
            .run(
                "sh",
                &["-c".to_string(), "echo token".to_string()],
                &mut ClosedPipe,
            )
            .unwrap_err();
        assert!(matches!(err, RunError::Relay(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
