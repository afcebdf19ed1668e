use std::process::Command;

use log::{debug, info};

use crate::error::{Result, SwitchoverError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external tools the cutover drives. Non-zero exits are errors.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;
}

pub(crate) fn command_line(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program];
    parts.extend_from_slice(args);
    parts.join(" ")
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let line = command_line(program, args);
        debug!("running {}", line);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SwitchoverError::CommandSpawn {
                command: line.clone(),
                source,
            })?;
        let result = ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if output.status.success() {
            Ok(result)
        } else {
            Err(SwitchoverError::CommandFailed {
                command: line,
                code: output.status.code(),
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

/// Logs instead of running anything.
pub struct NoopRunner;

impl CommandRunner for NoopRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        info!("noop: {}", command_line(program, args));
        Ok(ExecResult::default())
    }
}
