//! Compute control-plane client.
//!
//! Implements [`ComputeApi`] against nova-v2-shaped endpoints, including
//! the volume-attachment routes the helper uses instead of the storage
//! plane's own attach call.

use crate::api::{
    ApiError, ApiFuture, AttachmentRecord, ComputeApi, NetworkAddresses, ServerRecord,
};

use super::OpenStackSession;
use super::types::{
    AttachVolumeBody, AttachmentEnvelope, ServerEnvelope, ServerListEnvelope,
    VolumeAttachmentPayload,
};

/// Client for the compute service.
#[derive(Clone, Debug)]
pub struct ComputeClient {
    session: OpenStackSession,
}

impl ComputeClient {
    /// Creates a client over an authenticated session.
    #[must_use]
    pub const fn new(session: OpenStackSession) -> Self {
        Self { session }
    }
}

impl ComputeApi for ComputeClient {
    fn server_by_id<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, ServerRecord> {
        Box::pin(async move {
            let url = self.session.compute_url(&format!("servers/{server_id}"));
            let response = self.session.get(&url).await?;
            if response.is_not_found() {
                return Err(ApiError::NotFound {
                    resource: format!("server {server_id}"),
                });
            }
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: ServerEnvelope = response.decode()?;
            Ok(envelope.server.into())
        })
    }

    fn servers_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<ServerRecord>> {
        Box::pin(async move {
            let url = self.session.compute_url("servers");
            // The platform's name filter is a regex; anchoring keeps the
            // match exact. The equality check below guards against regex
            // metacharacters in the name widening the search.
            let pattern = format!("^{name}$");
            let response = self
                .session
                .get_with_query(&url, &[("name", pattern.as_str())])
                .await?;
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: ServerListEnvelope = response.decode()?;
            Ok(envelope
                .servers
                .into_iter()
                .map(ServerRecord::from)
                .filter(|server| server.name == name)
                .collect())
        })
    }

    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        volume_id: &'a str,
        device: &'a str,
    ) -> ApiFuture<'a, AttachmentRecord> {
        Box::pin(async move {
            let url = self
                .session
                .compute_url(&format!("servers/{server_id}/os-volume_attachments"));
            let body = AttachVolumeBody {
                volume_attachment: VolumeAttachmentPayload { volume_id, device },
            };
            let response = self.session.post(&url, &body).await?;
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: AttachmentEnvelope = response.decode()?;
            let created = envelope.volume_attachment;
            Ok(AttachmentRecord {
                server_id: created.server_id.unwrap_or_else(|| server_id.to_owned()),
                device: created.device.unwrap_or_else(|| device.to_owned()),
            })
        })
    }

    fn detach_volume<'a>(&'a self, server_id: &'a str, volume_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.session.compute_url(&format!(
                "servers/{server_id}/os-volume_attachments/{volume_id}"
            ));
            let response = self.session.delete(&url).await?;
            if response.is_not_found() {
                return Err(ApiError::NotFound {
                    resource: format!("attachment of volume {volume_id} on server {server_id}"),
                });
            }
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            Ok(())
        })
    }

    fn server_addresses<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, Vec<NetworkAddresses>> {
        Box::pin(async move {
            let url = self.session.compute_url(&format!("servers/{server_id}"));
            let response = self.session.get(&url).await?;
            if response.is_not_found() {
                return Err(ApiError::NotFound {
                    resource: format!("server {server_id}"),
                });
            }
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: ServerEnvelope = response.decode()?;
            Ok(envelope.server.networks())
        })
    }
}
