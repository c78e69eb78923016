//! Bounded external processes (`git`, `java`).

use std::ffi::OsStr;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use log::trace;
use tokio::process::Command;

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The last non-blank stderr line, for logs.
    pub fn last_error_line(&self) -> &str {
        self.stderr.lines().rev().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
    }
}

/// Runs `program` with `args` and waits at most `timeout`; the child is killed when the deadline passes.
/// Stdout is discarded.
pub async fn run_bounded<I, S>(
    program: &str, args: I, envs: &[(&str, &str)], timeout: Duration,
) -> anyhow::Result<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in envs {
        command.env(key, value);
    }

    trace!("Spawning {:?}...", command);
    let child = command.spawn().with_context(|| format!("Could not start '{}'", program))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => bail!("'{}' timed out after {} second(s)", program, timeout.as_secs()),
    };

    Ok(ProcessOutput {
        exit_code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Whether `error` says the program could not be found at all.
pub fn is_missing_program(error: &anyhow::Error) -> bool {
    error.downcast_ref::<io::Error>().map_or(false, |e| e.kind() == io::ErrorKind::NotFound)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    #[test]
    fn exit_codes_and_stderr_are_captured() {
        let output =
            aw!(run_bounded("sh", ["-c", "echo first >&2; echo boom >&2; exit 3"], &[], Duration::from_secs(10)))
                .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.last_error_line(), "boom");
    }

    #[test]
    fn environment_is_forwarded() {
        let output = aw!(run_bounded(
            "sh",
            ["-c", "test \"$GIT_TERMINAL_PROMPT\" = 0"],
            &[("GIT_TERMINAL_PROMPT", "0")],
            Duration::from_secs(10)
        ))
        .unwrap();

        assert!(output.success());
    }

    #[tokio::test]
    async fn slow_processes_are_cut_off() {
        let result = run_bounded("sleep", ["5"], &[], Duration::from_millis(100)).await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn missing_programs_are_errors() {
        let error = aw!(run_bounded("surely-not-a-real-binary", ["x"], &[], Duration::from_secs(1))).unwrap_err();

        assert!(is_missing_program(&error));
        assert!(format!("{:#}", error).starts_with("Could not start 'surely-not-a-real-binary'"));
    }

    #[test]
    fn failing_programs_are_not_missing_ones() {
        let error = aw!(run_bounded("sleep", ["5"], &[], Duration::from_millis(50))).unwrap_err();

        assert!(!is_missing_program(&error));
    }
}
