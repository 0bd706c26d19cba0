//! Remote shell execution over the system `ssh` client.
//!
//! The format operation needs exactly one privileged command run on the
//! server a volume is attached to, authenticated with a password. This
//! module wraps the system `ssh` binary (via `sshpass` so the password
//! travels in the `SSHPASS` environment variable, never on the command
//! line) behind a [`CommandRunner`] trait so tests can script outcomes
//! without spawning processes.
//!
//! A session is a short-lived scoped resource: one command per invocation,
//! and the child process is reaped on every exit path, including errors.
//! Host keys are never trusted silently; see [`HostKeyPolicy`].

use std::ffi::OsString;
use std::io::Write;
use std::net::IpAddr;
use std::process::{Command, Stdio};

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Exit code the ssh client reserves for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;

/// Environment variable `sshpass -e` reads the password from.
const SSHPASS_ENV: &str = "SSHPASS";

/// SSH settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "VOLIA_SSH")]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `sshpass` executable used for password authentication.
    #[ortho_config(default = "sshpass".to_owned())]
    pub sshpass_bin: String,
    /// TCP port the remote ssh daemon listens on.
    #[ortho_config(default = 22)]
    pub port: u16,
    /// Connection timeout passed to the ssh client, in seconds.
    #[ortho_config(default = 30)]
    pub connect_timeout_secs: u64,
    /// Known-hosts file holding the pinned host keys. When set, host keys
    /// are verified strictly against this file.
    pub known_hosts_file: Option<String>,
    /// Explicit opt-in to accepting unknown host keys. Off by default;
    /// mutually exclusive with `known_hosts_file`.
    #[ortho_config(default = false)]
    pub accept_unknown_host_keys: bool,
}

/// Host-key verification stance derived from [`SshConfig`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostKeyPolicy {
    /// Verify against the user's default known-hosts files.
    System,
    /// Verify strictly against a dedicated known-hosts file.
    Pinned(Utf8PathBuf),
    /// Trust any host key. Security-relevant; requires explicit opt-in.
    AcceptAny,
}

impl SshConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::ConfigLoad`] when the loader fails to merge
    /// sources.
    pub fn load_from_sources() -> Result<Self, SshError> {
        Self::load().map_err(|err| SshError::ConfigLoad {
            message: err.to_string(),
        })
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values still merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::ConfigLoad`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, SshError> {
        Self::load_from_iter([std::ffi::OsString::from("volia")]).map_err(|err| {
            SshError::ConfigLoad {
                message: err.to_string(),
            }
        })
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] when a required field is empty
    /// or zero, or [`SshError::ConflictingHostKeyPolicy`] when key pinning
    /// and the accept-any opt-in are both configured.
    pub fn validate(&self) -> Result<(), SshError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.sshpass_bin, "sshpass_bin")?;
        if self.connect_timeout_secs == 0 {
            return Err(SshError::InvalidConfig {
                field: String::from("connect_timeout_secs"),
            });
        }
        if let Some(path) = self.known_hosts_file.as_deref() {
            Self::require_value(path, "known_hosts_file")?;
            if self.accept_unknown_host_keys {
                return Err(SshError::ConflictingHostKeyPolicy);
            }
        }
        Ok(())
    }

    /// Returns the host-key policy the configuration selects.
    #[must_use]
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        if self.accept_unknown_host_keys {
            return HostKeyPolicy::AcceptAny;
        }
        self.known_hosts_file
            .as_deref()
            .map_or(HostKeyPolicy::System, |path| {
                HostKeyPolicy::Pinned(Utf8PathBuf::from(path))
            })
    }

    fn require_value(value: &str, field: &str) -> Result<(), SshError> {
        if value.trim().is_empty() {
            return Err(SshError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}

/// Address, port, and login user for one remote session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshTarget {
    /// Host address to connect to.
    pub host: IpAddr,
    /// TCP port of the remote ssh daemon.
    pub port: u16,
    /// Remote login user.
    pub user: String,
}

/// Fully rendered invocation handed to a [`CommandRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    /// Program to spawn.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Environment variables set for the child process.
    pub envs: Vec<(String, String)>,
    /// Payload written to the child's standard input, when present.
    pub stdin: Option<String>,
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Output captured from a remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by the remote command.
    pub exit_code: i32,
    /// Captured standard output stream.
    pub stdout: String,
    /// Captured standard error stream.
    pub stderr: String,
}

/// Errors surfaced while executing remote commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshError {
    /// Raised when configuration is missing required values.
    #[error("invalid ssh configuration: missing {field}")]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("ssh configuration parsing failed: {message}")]
    ConfigLoad {
        /// Loader error string.
        message: String,
    },
    /// Raised when key pinning and the accept-any opt-in are both set.
    #[error("known_hosts_file and accept_unknown_host_keys are mutually exclusive")]
    ConflictingHostKeyPolicy,
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when feeding stdin or collecting output fails.
    #[error("i/o error talking to {program}: {message}")]
    Io {
        /// Command being driven when the failure occurred.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the ssh client itself fails to establish the session.
    #[error("ssh connection to {host} failed: {stderr}")]
    Connection {
        /// Host the connection was attempted against.
        host: String,
        /// Stderr captured from the ssh client.
        stderr: String,
    },
    /// Raised when the process finishes without yielding an exit status.
    #[error("{program} did not return an exit code")]
    MissingExitCode {
        /// Command that completed without a status.
        program: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs the invocation, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Spawn`] if the command cannot be started, or
    /// [`SshError::Io`] if driving the child fails.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SshError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SshError> {
        let stdin = if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(key, value)| (key, value)))
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SshError::Spawn {
                program: spec.program.clone(),
                message: err.to_string(),
            })?;

        if let Some(payload) = &spec.stdin {
            if let Some(mut handle) = child.stdin.take() {
                // Dropping the handle closes the pipe so the remote side
                // sees end-of-input.
                handle
                    .write_all(payload.as_bytes())
                    .map_err(|err| SshError::Io {
                        program: spec.program.clone(),
                        message: err.to_string(),
                    })?;
            }
        }

        let output = child.wait_with_output().map_err(|err| SshError::Io {
            program: spec.program.clone(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Executes single remote commands over password-authenticated SSH.
#[derive(Debug)]
pub struct RemoteShell<R: CommandRunner> {
    config: SshConfig,
    runner: R,
}

impl RemoteShell<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, SshError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> RemoteShell<R> {
    /// Creates a new shell using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] or
    /// [`SshError::ConflictingHostKeyPolicy`] when validation fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, SshError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns the shell configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Builds a session target for `host` using the configured port.
    #[must_use]
    pub fn target(&self, host: IpAddr, user: impl Into<String>) -> SshTarget {
        SshTarget {
            host,
            port: self.config.port,
            user: user.into(),
        }
    }

    /// Runs `command` on the target in one short-lived session.
    ///
    /// The login password authenticates the session via `SSHPASS`; an
    /// optional `stdin` payload is forwarded to the remote command (ssh
    /// passes local standard input through to the remote side).
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Connection`] when the ssh client reports its
    /// own failure code, [`SshError::MissingExitCode`] when the process
    /// dies without a status, or the runner's spawn and i/o errors.
    pub fn execute(
        &self,
        target: &SshTarget,
        password: &str,
        command: &str,
        stdin: Option<&str>,
    ) -> Result<RemoteCommandOutput, SshError> {
        let spec = self.build_spec(target, password, command, stdin);
        let output = self.runner.run(&spec)?;

        let Some(exit_code) = output.code else {
            return Err(SshError::MissingExitCode {
                program: spec.program,
            });
        };
        if exit_code == SSH_CLIENT_FAILURE {
            return Err(SshError::Connection {
                host: target.host.to_string(),
                stderr: output.stderr,
            });
        }

        Ok(RemoteCommandOutput {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_spec(
        &self,
        target: &SshTarget,
        password: &str,
        command: &str,
        stdin: Option<&str>,
    ) -> CommandSpec {
        let mut args = vec![OsString::from("-e"), OsString::from(&self.config.ssh_bin)];
        args.extend(self.build_ssh_args(target, command));
        CommandSpec {
            program: self.config.sshpass_bin.clone(),
            args,
            envs: vec![(SSHPASS_ENV.to_owned(), password.to_owned())],
            stdin: stdin.map(str::to_owned),
        }
    }

    fn build_ssh_args(&self, target: &SshTarget, command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(target.port.to_string()),
            OsString::from("-o"),
            OsString::from(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout_secs
            )),
            OsString::from("-o"),
            OsString::from("NumberOfPasswordPrompts=1"),
        ];

        match self.config.host_key_policy() {
            HostKeyPolicy::System => {
                args.push(OsString::from("-o"));
                args.push(OsString::from("StrictHostKeyChecking=yes"));
            }
            HostKeyPolicy::Pinned(path) => {
                args.push(OsString::from("-o"));
                args.push(OsString::from("StrictHostKeyChecking=yes"));
                args.push(OsString::from("-o"));
                args.push(OsString::from(format!("UserKnownHostsFile={path}")));
            }
            HostKeyPolicy::AcceptAny => {
                args.push(OsString::from("-o"));
                args.push(OsString::from("StrictHostKeyChecking=no"));
                args.push(OsString::from("-o"));
                args.push(OsString::from("UserKnownHostsFile=/dev/null"));
            }
        }

        args.push(OsString::from(format!("{}@{}", target.user, target.host)));
        args.push(OsString::from(command));
        args
    }
}

#[cfg(test)]
mod tests;
