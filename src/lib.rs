//! Core library for the volia volume helper.
//!
//! The crate is a façade over two cloud control planes: it resolves
//! human-readable volume and server names to platform identifiers,
//! orchestrates attach and detach through the compute plane so both
//! platforms agree on attachment state, and formats an attached volume
//! over a short-lived SSH session.

pub mod api;
pub mod config;
pub mod format;
pub mod helper;
pub mod openstack;
pub mod reference;
pub mod ssh;
pub mod test_support;

pub use api::{
    AddressRecord, ApiError, AttachmentRecord, BlockStorageApi, ComputeApi, CreateVolumeRequest,
    NetworkAddresses, ServerRecord, VolumeRecord,
};
pub use config::{ConfigError, OpenStackConfig};
pub use format::{DEFAULT_FORMAT_COMMAND, FormatError, FormatOutcome, FormatRequest, RemoteLogin};
pub use helper::{HelperError, VolumeHelper};
pub use openstack::{BlockStorageClient, ComputeClient, OpenStackSession, connect};
pub use reference::{InvalidReference, ResourceRef};
pub use ssh::{
    CommandOutput, CommandRunner, CommandSpec, HostKeyPolicy, ProcessCommandRunner,
    RemoteCommandOutput, RemoteShell, SshConfig, SshError, SshTarget,
};
