//! Running external commands from application code.

use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::error::AppError;

/// Everything an external command produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Exit code, or `None` if the command was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

fn command_line(argv: &[&str]) -> String {
    argv.join(" ")
}

/// Run `argv`, feeding it `stdin`, and collect its output whatever the
/// exit status.
pub fn run_command_unchecked(argv: &[&str], stdin: &[u8]) -> Result<CommandOutput, AppError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(AppError::application("Cannot run an empty command"));
    };
    tracing::debug!(command = %command_line(argv), "running external command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::application(format!("Cannot run {}: {e}", command_line(argv))))?;

    // Feed stdin from a separate thread so a command that fills its output
    // pipe before reading all input cannot deadlock us.
    let input = child.stdin.take();
    let output = thread::scope(|scope| {
        if let Some(mut pipe) = input {
            scope.spawn(move || {
                // The command may exit without reading everything.
                let _ = pipe.write_all(stdin);
            });
        }
        child.wait_with_output()
    })?;

    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Run `argv` and return its standard output, failing with an
/// [`AppError::Application`] if it exits unsuccessfully.
pub fn run_command(argv: &[&str], stdin: &[u8]) -> Result<Vec<u8>, AppError> {
    let output = run_command_unchecked(argv, stdin)?;
    if !output.status.success() {
        let msg = format!(
            "Command failed: {}\n{}",
            command_line(argv),
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
        tracing::error!("{msg}");
        return Err(AppError::Application(msg));
    }
    Ok(output.stdout)
}
