//! Clients for the OpenStack-style control planes.
//!
//! One authentication round against the identity service yields a token and
//! the public endpoints of the block-storage and compute services; the two
//! clients then share that session for the lifetime of the helper. All
//! calls are plain HTTP with typed payloads and a bounded timeout.

mod block_storage;
mod compute;
mod identity;
mod types;

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::ApiError;
use crate::config::OpenStackConfig;
use crate::helper::VolumeHelper;

pub use block_storage::BlockStorageClient;
pub use compute::ComputeClient;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Authenticated session shared by the two service clients.
///
/// Holds the token and the service endpoints resolved from the catalog.
/// Read-only after authentication; there is no token refresh.
#[derive(Clone, Debug)]
pub struct OpenStackSession {
    token: String,
    volume_url: String,
    compute_url: String,
}

/// Status and body of a control-plane response, before interpretation.
pub(crate) struct RawResponse {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

impl RawResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|err| ApiError::Decode {
            message: err.to_string(),
        })
    }

    pub(crate) fn into_status_error(self) -> ApiError {
        ApiError::Status {
            status: self.status,
            message: self.text(),
        }
    }
}

fn transport(err: &reqwest::Error) -> ApiError {
    ApiError::Transport {
        message: err.to_string(),
    }
}

async fn collect(response: reqwest::Response) -> Result<RawResponse, ApiError> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|err| transport(&err))?
        .to_vec();
    Ok(RawResponse { status, body })
}

impl OpenStackSession {
    /// Authenticates against the identity service and resolves the
    /// block-storage and compute endpoints from the service catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the credentials are rejected or
    /// incomplete, [`ApiError::MissingService`] when the catalog lacks a
    /// required service, or [`ApiError::Transport`]/[`ApiError::Decode`]
    /// for request failures.
    pub async fn authenticate(config: &OpenStackConfig) -> Result<Self, ApiError> {
        identity::authenticate(config).await
    }

    pub(crate) fn volume_url(&self, path: &str) -> String {
        format!("{}/{path}", self.volume_url)
    }

    pub(crate) fn compute_url(&self, path: &str) -> String {
        format!("{}/{path}", self.compute_url)
    }

    pub(crate) async fn get(&self, url: &str) -> Result<RawResponse, ApiError> {
        let response = HTTP_CLIENT
            .get(url)
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        collect(response).await
    }

    pub(crate) async fn get_with_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<RawResponse, ApiError> {
        let response = HTTP_CLIENT
            .get(url)
            .header("X-Auth-Token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        collect(response).await
    }

    pub(crate) async fn post<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<RawResponse, ApiError> {
        let response = HTTP_CLIENT
            .post(url)
            .header("X-Auth-Token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        collect(response).await
    }

    pub(crate) async fn delete(&self, url: &str) -> Result<RawResponse, ApiError> {
        let response = HTTP_CLIENT
            .delete(url)
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        collect(response).await
    }
}

/// Authenticates once and returns a helper wired to the real clients.
///
/// # Errors
///
/// Propagates the errors of [`OpenStackSession::authenticate`].
pub async fn connect(
    config: &OpenStackConfig,
) -> Result<VolumeHelper<BlockStorageClient, ComputeClient>, ApiError> {
    let session = OpenStackSession::authenticate(config).await?;
    Ok(VolumeHelper::new(
        BlockStorageClient::new(session.clone()),
        ComputeClient::new(session),
    ))
}
