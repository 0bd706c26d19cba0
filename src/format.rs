//! Remote filesystem-format operation for attached volumes.
//!
//! Formatting runs on the server the volume is attached to, over one
//! short-lived SSH session: resolve the volume, read its attachment
//! metadata, pick the server's address, then run the format command with
//! elevated privilege. `sudo -S` reads the password from standard input,
//! which ssh forwards from the local side.
//!
//! Failure reporting is deliberately granular: resolution failures keep
//! their distinct kinds (volume missing, not attached, no address) as the
//! error source, and command failure is judged by the remote exit status,
//! not by scraping stderr.

use shell_escape::unix::escape;
use thiserror::Error;

use crate::api::{BlockStorageApi, ComputeApi};
use crate::helper::{HelperError, VolumeHelper};
use crate::ssh::{CommandRunner, RemoteShell, SshError};

/// Default format command, invoked with the device path appended.
pub const DEFAULT_FORMAT_COMMAND: &str = "/usr/sbin/mkfs.ext3";

/// Exit status shells reserve for "command not found".
const COMMAND_NOT_FOUND_EXIT: i32 = 127;

/// Login credentials for the host a volume is attached to.
///
/// The user must be allowed to run the format command under `sudo`. The
/// password authenticates the SSH session and answers the privilege
/// prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteLogin {
    /// Remote login user.
    pub user: String,
    /// Password for SSH authentication and privilege elevation.
    pub password: String,
}

impl RemoteLogin {
    /// Creates login credentials.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Parameters for a remote format operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatRequest {
    /// Volume reference (id or display name). Must already be attached.
    pub volume: String,
    /// Credentials for the attached host.
    pub login: RemoteLogin,
    /// Format command, full path. Defaults to [`DEFAULT_FORMAT_COMMAND`].
    pub command: String,
}

impl FormatRequest {
    /// Creates a request using the default format command.
    #[must_use]
    pub fn new(volume: impl Into<String>, login: RemoteLogin) -> Self {
        Self {
            volume: volume.into(),
            login,
            command: String::from(DEFAULT_FORMAT_COMMAND),
        }
    }

    /// Overrides the format command.
    #[must_use]
    pub fn command(mut self, value: impl Into<String>) -> Self {
        self.command = value.into();
        self
    }
}

/// Details of a completed format operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatOutcome {
    /// Server the command ran on.
    pub server_id: String,
    /// Device path that was formatted.
    pub device: String,
    /// Standard output captured from the format command.
    pub stdout: String,
}

/// Errors surfaced while formatting a volume.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FormatError {
    /// Raised when the volume, its attachment, or the server address
    /// cannot be resolved. The source keeps the specific failure kind.
    #[error("cannot locate the format target: {0}")]
    Resolve(#[source] HelperError),
    /// Raised when the SSH session cannot be established or driven.
    #[error("remote session failed: {0}")]
    Shell(#[source] SshError),
    /// Raised when the remote shell reports the command as absent.
    #[error("format command '{command}' not found on the remote host")]
    CommandNotFound {
        /// Command that was attempted.
        command: String,
        /// Stderr captured from the remote shell.
        stderr: String,
    },
    /// Raised when the format command exits with a non-zero status.
    #[error("format command '{command}' exited with status {exit_code}")]
    CommandFailed {
        /// Command that was attempted.
        command: String,
        /// Remote exit status.
        exit_code: i32,
        /// Stderr captured from the remote command.
        stderr: String,
    },
}

/// Renders the privileged remote command line for a format run.
///
/// Both operands are shell-escaped. `-S` makes `sudo` read the password
/// from standard input; `-p ''` silences the prompt so it does not
/// interleave with command output.
fn render_format_command(command: &str, device: &str) -> String {
    format!(
        "sudo -S -p '' {} {}",
        escape(command.into()),
        escape(device.into())
    )
}

impl<B, C> VolumeHelper<B, C>
where
    B: BlockStorageApi,
    C: ComputeApi,
{
    /// Formats an attached volume on its server over SSH.
    ///
    /// The session lives for exactly this one command and is released on
    /// every exit path. Success is judged by the remote exit status.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Resolve`] when the volume, attachment, or
    /// server address cannot be determined (the source preserves which),
    /// [`FormatError::Shell`] for session failures, and
    /// [`FormatError::CommandNotFound`] or [`FormatError::CommandFailed`]
    /// based on the remote exit status.
    pub async fn format_volume<R: CommandRunner>(
        &self,
        shell: &RemoteShell<R>,
        request: &FormatRequest,
    ) -> Result<FormatOutcome, FormatError> {
        let volume = self
            .resolve_volume(&request.volume)
            .await
            .map_err(FormatError::Resolve)?;
        let attachment = self
            .attachment(&volume.id)
            .await
            .map_err(FormatError::Resolve)?;
        let address = self
            .server_ip(&attachment.server_id)
            .await
            .map_err(FormatError::Resolve)?;

        let target = shell.target(address, request.login.user.clone());
        let command_line = render_format_command(&request.command, &attachment.device);
        let sudo_password = format!("{}\n", request.login.password);

        let output = shell
            .execute(
                &target,
                &request.login.password,
                &command_line,
                Some(&sudo_password),
            )
            .map_err(FormatError::Shell)?;

        match output.exit_code {
            0 => Ok(FormatOutcome {
                server_id: attachment.server_id,
                device: attachment.device,
                stdout: output.stdout,
            }),
            COMMAND_NOT_FOUND_EXIT => Err(FormatError::CommandNotFound {
                command: request.command.clone(),
                stderr: output.stderr,
            }),
            exit_code => Err(FormatError::CommandFailed {
                command: request.command.clone(),
                exit_code,
                stderr: output.stderr,
            }),
        }
    }
}
