use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

pub type Result<T, E = SwitchoverError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SwitchoverError {
    /// The network config has not been written yet.
    #[error("network config {path:?} not found")]
    ArtifactNotFound { path: PathBuf },

    #[error("unable to parse network config {path:?}: {message}")]
    ArtifactParse { path: PathBuf, message: String },

    #[error("{call} failed: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: Errno,
    },

    #[error("unable to run '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' failed with {}: {stderr}", exit_code_str(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("cancelled while waiting for {what}")]
    Cancelled { what: String },

    #[error("unable to {action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to load agent config {path:?}: {source}")]
    AgentConfig {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("invalid interface {name}: {message}")]
    InvalidDescriptor { name: String, message: String },
}

impl SwitchoverError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

fn exit_code_str(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "a signal".into(),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = SwitchoverError::CommandFailed {
            command: "/sbin/ifup vlan201".into(),
            code: Some(1),
            stderr: "no such device".into(),
        };
        assert_eq!(
            err.to_string(),
            "'/sbin/ifup vlan201' failed with exit code 1: no such device"
        );

        let err = SwitchoverError::CommandFailed {
            command: "/usr/bin/systemctl restart ivs".into(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "'/usr/bin/systemctl restart ivs' failed with a signal: "
        );
    }
}
