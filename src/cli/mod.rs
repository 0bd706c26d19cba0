//! Command-line interface definitions for the `volia` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page. It must stay self-contained (clap and std only) because the build
//! script compiles it outside the library crate.

use clap::Parser;

/// Default format command offered by the `format` subcommand.
pub(crate) const DEFAULT_FORMAT_COMMAND: &str = "/usr/sbin/mkfs.ext3";

/// Top-level CLI for the `volia` binary.
#[derive(Debug, Parser)]
#[command(
    name = "volia",
    about = "Manage named block-storage volumes and format them over SSH",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create a volume and print its id.
    #[command(name = "create", about = "Create a volume and print its id")]
    Create(CreateCommand),
    /// Resolve a name or id and print the volume id.
    #[command(name = "lookup", about = "Resolve a name or id and print the volume id")]
    Lookup(LookupCommand),
    /// Attach a volume to a server.
    #[command(name = "attach", about = "Attach a volume to a server")]
    Attach(AttachCommand),
    /// Detach a volume from its server.
    #[command(name = "detach", about = "Detach a volume from its server")]
    Detach(DetachCommand),
    /// Delete a volume.
    #[command(name = "delete", about = "Delete a volume")]
    Delete(DeleteCommand),
    /// Format an attached volume on its server over SSH.
    #[command(
        name = "format",
        about = "Format an attached volume on its server over SSH"
    )]
    Format(FormatCommand),
}

/// Arguments for the `volia create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Volume size in gibibytes.
    #[arg(long, value_name = "GIB")]
    pub(crate) size: u64,
    /// Display name for the new volume. Unnamed volumes are allowed.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Volume type understood by the platform.
    #[arg(long, value_name = "TYPE")]
    pub(crate) volume_type: Option<String>,
    /// Availability zone for the new volume.
    #[arg(long, value_name = "ZONE")]
    pub(crate) availability_zone: Option<String>,
}

/// Arguments for the `volia lookup` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct LookupCommand {
    /// Volume reference: platform id or display name.
    #[arg(value_name = "VOLUME")]
    pub(crate) reference: String,
}

/// Arguments for the `volia attach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AttachCommand {
    /// Volume reference: platform id or display name.
    #[arg(value_name = "VOLUME")]
    pub(crate) volume: String,
    /// Server reference: platform id or name.
    #[arg(value_name = "SERVER")]
    pub(crate) server: String,
    /// Device path the volume is exposed as, for example `/dev/vdb`.
    #[arg(value_name = "DEVICE")]
    pub(crate) device: String,
}

/// Arguments for the `volia detach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DetachCommand {
    /// Volume reference: platform id or display name.
    #[arg(value_name = "VOLUME")]
    pub(crate) volume: String,
}

/// Arguments for the `volia delete` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Volume reference: platform id or display name.
    #[arg(value_name = "VOLUME")]
    pub(crate) reference: String,
}

/// Arguments for the `volia format` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct FormatCommand {
    /// Volume reference: platform id or display name. Must be attached.
    #[arg(value_name = "VOLUME")]
    pub(crate) volume: String,
    /// Login user on the attached server. Must be allowed to run the
    /// format command under sudo.
    #[arg(long, value_name = "USER")]
    pub(crate) user: String,
    /// Login password, taken from the environment so it never appears in
    /// the process list.
    #[arg(long, env = "VOLIA_HOST_PASSWORD", hide_env_values = true)]
    pub(crate) password: String,
    /// Format command to run, full path.
    #[arg(long, value_name = "COMMAND", default_value = DEFAULT_FORMAT_COMMAND)]
    pub(crate) command: String,
}
