//! Block-storage control-plane client.
//!
//! Implements [`BlockStorageApi`] against cinder-v1-shaped endpoints. The
//! attach route is intentionally absent; attachment goes through the
//! compute plane (see [`crate::helper`]).

use crate::api::{ApiError, ApiFuture, BlockStorageApi, CreateVolumeRequest, VolumeRecord};

use super::OpenStackSession;
use super::types::{CreateVolumeBody, CreateVolumePayload, VolumeEnvelope, VolumeListEnvelope};

/// Client for the block-storage service.
#[derive(Clone, Debug)]
pub struct BlockStorageClient {
    session: OpenStackSession,
}

impl BlockStorageClient {
    /// Creates a client over an authenticated session.
    #[must_use]
    pub const fn new(session: OpenStackSession) -> Self {
        Self { session }
    }
}

impl BlockStorageApi for BlockStorageClient {
    fn volume_by_id<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, VolumeRecord> {
        Box::pin(async move {
            let url = self.session.volume_url(&format!("volumes/{volume_id}"));
            let response = self.session.get(&url).await?;
            if response.is_not_found() {
                return Err(ApiError::NotFound {
                    resource: format!("volume {volume_id}"),
                });
            }
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: VolumeEnvelope = response.decode()?;
            Ok(envelope.volume.into())
        })
    }

    fn volumes_by_display_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<VolumeRecord>> {
        Box::pin(async move {
            let url = self.session.volume_url("volumes/detail");
            let response = self
                .session
                .get_with_query(&url, &[("display_name", name)])
                .await?;
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: VolumeListEnvelope = response.decode()?;
            // The filter is also applied client-side so a platform that
            // matches substrings cannot widen resolution.
            Ok(envelope
                .volumes
                .into_iter()
                .map(VolumeRecord::from)
                .filter(|volume| volume.display_name.as_deref() == Some(name))
                .collect())
        })
    }

    fn create_volume<'a>(&'a self, request: &'a CreateVolumeRequest) -> ApiFuture<'a, VolumeRecord> {
        Box::pin(async move {
            let url = self.session.volume_url("volumes");
            let body = CreateVolumeBody {
                volume: CreateVolumePayload {
                    size: request.size_gb,
                    display_name: request.display_name.as_deref(),
                    volume_type: request.volume_type.as_deref(),
                    availability_zone: request.availability_zone.as_deref(),
                },
            };
            let response = self.session.post(&url, &body).await?;
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            let envelope: VolumeEnvelope = response.decode()?;
            Ok(envelope.volume.into())
        })
    }

    fn delete_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.session.volume_url(&format!("volumes/{volume_id}"));
            let response = self.session.delete(&url).await?;
            if response.is_not_found() {
                return Err(ApiError::NotFound {
                    resource: format!("volume {volume_id}"),
                });
            }
            if !response.is_success() {
                return Err(response.into_status_error());
            }
            Ok(())
        })
    }
}
