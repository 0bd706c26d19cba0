//! Name-first volume orchestration over the two control planes.
//!
//! [`VolumeHelper`] resolves caller-supplied references (platform id or
//! display name, indistinguishable up front) and sequences the lifecycle
//! calls. Two policies live here and nowhere else:
//!
//! * Resolution tries the reference as an id first and falls back to an
//!   exact-name search only when the platform reports true absence; any
//!   other failure propagates so a transient error cannot widen the search.
//! * Attachment always routes through the compute control plane. Attaching
//!   via the storage plane directly can leave a volume marked "in use"
//!   after its server is destroyed without a clean detach, because the
//!   compute plane never learns of the attachment and cannot clear the
//!   state. Routing through compute keeps both platforms' records
//!   consistent.
//!
//! Where the platform returns lists (search matches, attachments,
//! networks), the first entry in listing order wins. The platform does not
//! guarantee that order is stable; this is documented policy, not a
//! correctness claim.

use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::api::{
    ApiError, AttachmentRecord, BlockStorageApi, ComputeApi, CreateVolumeRequest, ServerRecord,
    VolumeRecord,
};
use crate::reference::{InvalidReference, ResourceRef};

/// Errors raised by helper operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HelperError {
    /// Raised when a reference fails validation before any remote call.
    #[error(transparent)]
    InvalidReference(#[from] InvalidReference),
    /// Raised when neither id lookup nor name search locates a volume.
    #[error("no volume matches '{reference}' by id or display name")]
    VolumeNotFound {
        /// Reference the caller supplied.
        reference: String,
    },
    /// Raised when neither id lookup nor name search locates a server.
    #[error("no server matches '{reference}' by id or name")]
    ServerNotFound {
        /// Reference the caller supplied.
        reference: String,
    },
    /// Raised when a volume has no attachment record where one was expected.
    #[error("volume {volume_id} is not attached to any server")]
    NotAttached {
        /// Identifier of the unattached volume.
        volume_id: String,
    },
    /// Raised when a server exposes no usable IP address.
    #[error("server {server_id} exposes no usable IP address")]
    NoIpAddress {
        /// Identifier of the addressless server.
        server_id: String,
    },
    /// Wrapper for control-plane failures.
    #[error("control plane request failed: {0}")]
    Api(#[from] ApiError),
}

/// Façade over the block-storage and compute control planes.
///
/// Holds the two client handles, constructed once and read-only afterwards.
/// Every operation is a linear sequence of lookups followed by at most one
/// mutating call; nothing is retried and no state is kept between calls.
#[derive(Clone, Debug)]
pub struct VolumeHelper<B, C> {
    storage: B,
    compute: C,
}

impl<B, C> VolumeHelper<B, C>
where
    B: BlockStorageApi,
    C: ComputeApi,
{
    /// Creates a helper from the two client handles.
    #[must_use]
    pub const fn new(storage: B, compute: C) -> Self {
        Self { storage, compute }
    }

    /// Resolves a volume reference (id or display name) to its record.
    ///
    /// The reference is tried as an id first; the name search runs only
    /// when the platform reports the id as absent. The first name match in
    /// listing order wins.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::InvalidReference`] for blank references
    /// before any remote call, [`HelperError::VolumeNotFound`] when both
    /// paths miss, or [`HelperError::Api`] for any other platform failure.
    pub async fn resolve_volume(&self, reference: &str) -> Result<VolumeRecord, HelperError> {
        let volume_ref = ResourceRef::parse(reference)?;
        self.resolve_volume_ref(&volume_ref).await
    }

    async fn resolve_volume_ref(&self, volume_ref: &ResourceRef) -> Result<VolumeRecord, HelperError> {
        match self.storage.volume_by_id(volume_ref.as_str()).await {
            Ok(volume) => return Ok(volume),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let mut matches = self
            .storage
            .volumes_by_display_name(volume_ref.as_str())
            .await?;
        if matches.is_empty() {
            return Err(HelperError::VolumeNotFound {
                reference: volume_ref.to_string(),
            });
        }
        Ok(matches.remove(0))
    }

    /// Resolves a server reference (id or name) to its record.
    ///
    /// Identical shape to [`VolumeHelper::resolve_volume`], searching
    /// compute instances by exact name instead.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::InvalidReference`],
    /// [`HelperError::ServerNotFound`], or [`HelperError::Api`] as for
    /// volume resolution.
    pub async fn resolve_server(&self, reference: &str) -> Result<ServerRecord, HelperError> {
        let server_ref = ResourceRef::parse(reference)?;
        self.resolve_server_ref(&server_ref).await
    }

    async fn resolve_server_ref(&self, server_ref: &ResourceRef) -> Result<ServerRecord, HelperError> {
        match self.compute.server_by_id(server_ref.as_str()).await {
            Ok(server) => return Ok(server),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let mut matches = self.compute.servers_by_name(server_ref.as_str()).await?;
        if matches.is_empty() {
            return Err(HelperError::ServerNotFound {
                reference: server_ref.to_string(),
            });
        }
        Ok(matches.remove(0))
    }

    /// Retrieves the attachment record for a resolved volume id.
    ///
    /// The volume is re-fetched so the metadata reflects current platform
    /// state. Multi-attach is unsupported; the first attachment record in
    /// listing order is used.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::NotAttached`] when the platform reports no
    /// complete attachment record, or [`HelperError::Api`] when the fetch
    /// fails.
    pub async fn attachment(&self, volume_id: &str) -> Result<AttachmentRecord, HelperError> {
        let volume = self.storage.volume_by_id(volume_id).await?;
        volume
            .attachments
            .first()
            .cloned()
            .ok_or_else(|| HelperError::NotAttached {
                volume_id: volume_id.to_owned(),
            })
    }

    /// Creates a volume and returns its platform-assigned identifier.
    ///
    /// Size and the optional fields are passed through untouched; the
    /// platform enforces its own limits.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::Api`] when the creation call fails.
    pub async fn create(&self, request: &CreateVolumeRequest) -> Result<String, HelperError> {
        let volume = self.storage.create_volume(request).await?;
        Ok(volume.id)
    }

    /// Resolves a reference and returns the volume's identifier.
    ///
    /// Pure read; no side effects.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`VolumeHelper::resolve_volume`].
    pub async fn lookup(&self, reference: &str) -> Result<String, HelperError> {
        let volume = self.resolve_volume(reference).await?;
        Ok(volume.id)
    }

    /// Resolves a reference and deletes the volume.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors; returns [`HelperError::Api`] when the
    /// delete call fails.
    pub async fn delete(&self, reference: &str) -> Result<(), HelperError> {
        let volume = self.resolve_volume(reference).await?;
        self.storage.delete_volume(&volume.id).await?;
        Ok(())
    }

    /// Attaches a volume to a server at the given device path.
    ///
    /// Both references are validated before any remote call, then resolved;
    /// the attach request then goes through the compute control plane's
    /// volume-attachment endpoint, not the storage plane's own attach call
    /// (see the module documentation for why).
    ///
    /// # Errors
    ///
    /// Propagates resolution errors for either reference; returns
    /// [`HelperError::Api`] when the attach call fails.
    pub async fn attach(
        &self,
        volume: &str,
        server: &str,
        device: &str,
    ) -> Result<AttachmentRecord, HelperError> {
        let volume_ref = ResourceRef::parse(volume)?;
        let server_ref = ResourceRef::parse(server)?;

        let server_record = self.resolve_server_ref(&server_ref).await?;
        let volume_record = self.resolve_volume_ref(&volume_ref).await?;
        let attachment = self
            .compute
            .attach_volume(&server_record.id, &volume_record.id, device)
            .await?;
        Ok(attachment)
    }

    /// Detaches a volume from the server it is attached to.
    ///
    /// The server id comes from the volume's attachment metadata;
    /// detachment goes through the compute control plane.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors; returns [`HelperError::NotAttached`]
    /// when the volume has no attachment record, or [`HelperError::Api`]
    /// when the detach call fails.
    pub async fn detach(&self, volume: &str) -> Result<(), HelperError> {
        let record = self.resolve_volume(volume).await?;
        let attachment = self.attachment(&record.id).await?;
        self.compute
            .detach_volume(&attachment.server_id, &record.id)
            .await?;
        Ok(())
    }

    /// Returns a reachable IP address for a server.
    ///
    /// The first network in listing order is consulted; within it, the
    /// first IPv4 address wins, falling back to the first address of any
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::NoIpAddress`] when the server lists no
    /// parseable address, or [`HelperError::Api`] when the fetch fails.
    pub async fn server_ip(&self, server_id: &str) -> Result<IpAddr, HelperError> {
        let networks = self.compute.server_addresses(server_id).await?;
        let no_address = || HelperError::NoIpAddress {
            server_id: server_id.to_owned(),
        };

        let first_network = networks.first().ok_or_else(no_address)?;
        let entry = first_network
            .addresses
            .iter()
            .find(|address| address.version == 4)
            .or_else(|| first_network.addresses.first())
            .ok_or_else(no_address)?;

        IpAddr::from_str(&entry.addr).map_err(|_| no_address())
    }
}

#[cfg(test)]
mod tests;
