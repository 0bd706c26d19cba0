//! Wire payloads for the block-storage and compute control planes.

use serde::{Deserialize, Serialize};

use crate::api::{AddressRecord, AttachmentRecord, NetworkAddresses, ServerRecord, VolumeRecord};

// Block storage.

#[derive(Serialize)]
pub(crate) struct CreateVolumeBody<'a> {
    pub volume: CreateVolumePayload<'a>,
}

#[derive(Serialize)]
pub(crate) struct CreateVolumePayload<'a> {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<&'a str>,
}

#[derive(Deserialize)]
pub(crate) struct VolumeEnvelope {
    pub volume: VolumeWire,
}

#[derive(Deserialize)]
pub(crate) struct VolumeListEnvelope {
    #[serde(default)]
    pub volumes: Vec<VolumeWire>,
}

#[derive(Deserialize)]
pub(crate) struct VolumeWire {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub attachments: Vec<AttachmentWire>,
}

/// Attachment entry as listed on a volume. The platform may emit partial
/// records; an entry without a server id or device cannot be detached or
/// formatted, so it is dropped and the volume reads as not attached.
#[derive(Deserialize)]
pub(crate) struct AttachmentWire {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl From<VolumeWire> for VolumeRecord {
    fn from(wire: VolumeWire) -> Self {
        Self {
            id: wire.id,
            display_name: wire.display_name,
            status: wire.status,
            size_gb: wire.size,
            attachments: wire
                .attachments
                .into_iter()
                .filter_map(|attachment| match (attachment.server_id, attachment.device) {
                    (Some(server_id), Some(device)) => {
                        Some(AttachmentRecord { server_id, device })
                    }
                    _ => None,
                })
                .collect(),
        }
    }
}

// Compute.

#[derive(Serialize)]
pub(crate) struct AttachVolumeBody<'a> {
    #[serde(rename = "volumeAttachment")]
    pub volume_attachment: VolumeAttachmentPayload<'a>,
}

#[derive(Serialize)]
pub(crate) struct VolumeAttachmentPayload<'a> {
    #[serde(rename = "volumeId")]
    pub volume_id: &'a str,
    pub device: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct AttachmentEnvelope {
    #[serde(rename = "volumeAttachment")]
    pub volume_attachment: CreatedAttachmentWire,
}

/// Attach responses use the compute plane's camel-case field names.
#[derive(Deserialize)]
pub(crate) struct CreatedAttachmentWire {
    #[serde(rename = "serverId", default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ServerEnvelope {
    pub server: ServerWire,
}

#[derive(Deserialize)]
pub(crate) struct ServerListEnvelope {
    #[serde(default)]
    pub servers: Vec<ServerWire>,
}

#[derive(Deserialize)]
pub(crate) struct ServerWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addresses: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct AddressWire {
    addr: String,
    #[serde(default)]
    version: Option<u8>,
}

impl ServerWire {
    /// Returns the server's addresses grouped by network, preserving the
    /// document's listing order. Networks with malformed entries decode to
    /// an empty list rather than failing the whole response.
    pub(crate) fn networks(&self) -> Vec<NetworkAddresses> {
        self.addresses
            .iter()
            .map(|(network, value)| NetworkAddresses {
                network: network.clone(),
                addresses: serde_json::from_value::<Vec<AddressWire>>(value.clone())
                    .unwrap_or_default()
                    .into_iter()
                    .map(|entry| {
                        let version = entry
                            .version
                            .unwrap_or(if entry.addr.contains(':') { 6 } else { 4 });
                        AddressRecord {
                            addr: entry.addr,
                            version,
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}

impl From<ServerWire> for ServerRecord {
    fn from(wire: ServerWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
        }
    }
}
