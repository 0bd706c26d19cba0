//! Control-plane abstractions for block storage and compute.
//!
//! The helper talks to two external control planes through the traits
//! defined here. Records are plain snapshots of platform state; nothing is
//! cached or tracked between calls. [`BlockStorageApi`] intentionally has
//! no attach or detach operation: attachment must route through the compute
//! control plane so both platforms agree on the volume's state (see
//! [`crate::helper::VolumeHelper::attach`]), and leaving the storage-side
//! route out of the trait keeps that path unrepresentable.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Snapshot of a block-storage volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRecord {
    /// Platform-assigned volume identifier.
    pub id: String,
    /// Human-readable display name, when one was assigned.
    pub display_name: Option<String>,
    /// Lifecycle status as reported by the platform.
    pub status: String,
    /// Provisioned size in gibibytes.
    pub size_gb: u64,
    /// Attachment records in the platform's listing order.
    pub attachments: Vec<AttachmentRecord>,
}

/// Relation binding a volume to the server it is attached to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachmentRecord {
    /// Identifier of the server holding the attachment.
    pub server_id: String,
    /// Device path the volume is exposed as on the server.
    pub device: String,
}

/// Snapshot of a compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerRecord {
    /// Platform-assigned server identifier.
    pub id: String,
    /// Server name.
    pub name: String,
}

/// A single address entry under a server network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressRecord {
    /// Textual address as reported by the platform.
    pub addr: String,
    /// IP version (4 or 6).
    pub version: u8,
}

/// Addresses grouped by network, in the platform's listing order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkAddresses {
    /// Network label the addresses belong to.
    pub network: String,
    /// Address entries in listing order.
    pub addresses: Vec<AddressRecord>,
}

/// Parameters for creating a new volume.
///
/// Size is passed through untouched; the platform enforces its own limits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolumeRequest {
    /// Requested size in gibibytes.
    pub size_gb: u64,
    /// Optional display name; unnamed volumes are allowed.
    pub display_name: Option<String>,
    /// Optional volume type understood by the platform.
    pub volume_type: Option<String>,
    /// Optional availability zone.
    pub availability_zone: Option<String>,
}

impl CreateVolumeRequest {
    /// Creates a request for an unnamed volume of the given size.
    #[must_use]
    pub const fn new(size_gb: u64) -> Self {
        Self {
            size_gb,
            display_name: None,
            volume_type: None,
            availability_zone: None,
        }
    }

    /// Sets the display name, trimming surrounding whitespace.
    #[must_use]
    pub fn display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = Some(value.into().trim().to_owned());
        self
    }

    /// Sets the volume type.
    #[must_use]
    pub fn volume_type(mut self, value: impl Into<String>) -> Self {
        self.volume_type = Some(value.into().trim().to_owned());
        self
    }

    /// Sets the availability zone.
    #[must_use]
    pub fn availability_zone(mut self, value: impl Into<String>) -> Self {
        self.availability_zone = Some(value.into().trim().to_owned());
        self
    }
}

/// Errors raised by control-plane clients.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when authentication against the identity service fails.
    #[error("authentication failed: {message}")]
    Auth {
        /// Message returned by the identity service.
        message: String,
    },
    /// Raised when the service catalog lacks a required service entry.
    #[error("service catalog has no usable '{service}' endpoint")]
    MissingService {
        /// Catalog service type that was expected.
        service: String,
    },
    /// Raised when the HTTP request itself fails (connect, timeout, TLS).
    #[error("transport error: {message}")]
    Transport {
        /// Operating system or client error string.
        message: String,
    },
    /// Raised when the platform reports the requested resource is absent.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing resource, e.g. `volume 0f3a`.
        resource: String,
    },
    /// Raised when the platform answers with an unexpected status code.
    #[error("control plane returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, when one was readable.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode control plane response: {message}")]
    Decode {
        /// Decoder error string.
        message: String,
    },
}

impl ApiError {
    /// Returns `true` for true-absence failures.
    ///
    /// Resolution falls back from id lookup to name search only when this
    /// returns `true`; transient failures propagate instead of silently
    /// widening the search.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Future returned by control-plane operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Operations the helper needs from the block-storage control plane.
///
/// There is deliberately no attach or detach here; see the module
/// documentation.
pub trait BlockStorageApi {
    /// Fetches a volume by its platform identifier.
    fn volume_by_id<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, VolumeRecord>;

    /// Lists volumes whose display name exactly matches `name`.
    fn volumes_by_display_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<VolumeRecord>>;

    /// Creates a new volume and returns its record.
    fn create_volume<'a>(&'a self, request: &'a CreateVolumeRequest) -> ApiFuture<'a, VolumeRecord>;

    /// Deletes a volume by its platform identifier.
    fn delete_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()>;
}

/// Operations the helper needs from the compute control plane.
pub trait ComputeApi {
    /// Fetches a server by its platform identifier.
    fn server_by_id<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, ServerRecord>;

    /// Lists servers whose name exactly matches `name` (anchored,
    /// case-sensitive).
    fn servers_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<ServerRecord>>;

    /// Attaches a volume to a server at the given device path.
    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        volume_id: &'a str,
        device: &'a str,
    ) -> ApiFuture<'a, AttachmentRecord>;

    /// Detaches a volume from a server.
    fn detach_volume<'a>(&'a self, server_id: &'a str, volume_id: &'a str) -> ApiFuture<'a, ()>;

    /// Fetches the server's addresses grouped by network, in listing order.
    fn server_addresses<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, Vec<NetworkAddresses>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_setters_trim_inputs() {
        let request = CreateVolumeRequest::new(10)
            .display_name("  cache  ")
            .volume_type(" ssd ")
            .availability_zone(" nova ");

        assert_eq!(request.size_gb, 10);
        assert_eq!(request.display_name.as_deref(), Some("cache"));
        assert_eq!(request.volume_type.as_deref(), Some("ssd"));
        assert_eq!(request.availability_zone.as_deref(), Some("nova"));
    }

    #[test]
    fn not_found_classification_covers_only_absence() {
        let absent = ApiError::NotFound {
            resource: String::from("volume v1"),
        };
        let transient = ApiError::Transport {
            message: String::from("timed out"),
        };

        assert!(absent.is_not_found());
        assert!(!transient.is_not_found());
    }
}
