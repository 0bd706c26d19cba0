//! Password authentication against the identity service.
//!
//! A single POST to `{auth_url}/tokens` exchanges the credential quartet
//! for a scoped token and the service catalog. The first catalog entry of
//! each required service type and its first endpoint are used, in listing
//! order.

use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::config::OpenStackConfig;

use super::{HTTP_CLIENT, OpenStackSession, collect};

const VOLUME_SERVICE: &str = "volume";
const COMPUTE_SERVICE: &str = "compute";

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthPayload<'a>,
}

#[derive(Serialize)]
struct AuthPayload<'a> {
    #[serde(rename = "passwordCredentials")]
    password_credentials: PasswordCredentials<'a>,
    #[serde(rename = "tenantName")]
    tenant_name: &'a str,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct Token {
    id: String,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

pub(super) async fn authenticate(config: &OpenStackConfig) -> Result<OpenStackSession, ApiError> {
    config.validate().map_err(|err| ApiError::Auth {
        message: err.to_string(),
    })?;

    let url = format!("{}/tokens", config.auth_url.trim_end_matches('/'));
    let body = AuthRequest {
        auth: AuthPayload {
            password_credentials: PasswordCredentials {
                username: &config.username,
                password: &config.password,
            },
            tenant_name: &config.tenant_name,
        },
    };

    let response = HTTP_CLIENT
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|err| ApiError::Transport {
            message: err.to_string(),
        })?;
    let raw = collect(response).await?;

    if !raw.is_success() {
        return Err(ApiError::Auth {
            message: format!("identity service returned status {}: {}", raw.status, raw.text()),
        });
    }

    let parsed: AuthResponse = raw.decode()?;
    let volume_url = first_public_url(&parsed.access.service_catalog, VOLUME_SERVICE)?;
    let compute_url = first_public_url(&parsed.access.service_catalog, COMPUTE_SERVICE)?;

    Ok(OpenStackSession {
        token: parsed.access.token.id,
        volume_url,
        compute_url,
    })
}

/// Picks the first matching catalog entry and its first endpoint.
fn first_public_url(catalog: &[CatalogEntry], service: &str) -> Result<String, ApiError> {
    catalog
        .iter()
        .find(|entry| entry.service_type == service)
        .and_then(|entry| entry.endpoints.first())
        .map(|endpoint| endpoint.public_url.trim_end_matches('/').to_owned())
        .ok_or_else(|| ApiError::MissingService {
            service: service.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_uses_the_platform_field_names() {
        let body = AuthRequest {
            auth: AuthPayload {
                password_credentials: PasswordCredentials {
                    username: "admin",
                    password: "secret",
                },
                tenant_name: "admin",
            },
        };
        let json = serde_json::to_string(&body).expect("serialise");
        assert!(json.contains(r#""passwordCredentials""#));
        assert!(json.contains(r#""tenantName":"admin""#));
        assert!(json.contains(r#""username":"admin""#));
    }

    #[test]
    fn first_public_url_takes_listing_order_and_trims_slashes() {
        let payload = r#"{
            "access": {
                "token": {"id": "tok-1"},
                "serviceCatalog": [
                    {"type": "volume", "endpoints": [
                        {"publicURL": "http://cinder-a:8776/v1/t/"},
                        {"publicURL": "http://cinder-b:8776/v1/t"}
                    ]},
                    {"type": "compute", "endpoints": [
                        {"publicURL": "http://nova:8774/v2/t"}
                    ]}
                ]
            }
        }"#;
        let parsed: AuthResponse = serde_json::from_str(payload).expect("parse");

        let volume = first_public_url(&parsed.access.service_catalog, "volume")
            .expect("volume endpoint expected");
        assert_eq!(volume, "http://cinder-a:8776/v1/t");
        assert_eq!(parsed.access.token.id, "tok-1");
    }

    #[test]
    fn missing_catalog_entry_is_reported_by_service_type() {
        let result = first_public_url(&[], "compute");
        assert!(
            matches!(
                result,
                Err(ApiError::MissingService { ref service }) if service == "compute"
            ),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn catalog_entry_without_endpoints_counts_as_missing() {
        let payload = r#"{
            "access": {
                "token": {"id": "tok-1"},
                "serviceCatalog": [{"type": "volume", "endpoints": []}]
            }
        }"#;
        let parsed: AuthResponse = serde_json::from_str(payload).expect("parse");
        let result = first_public_url(&parsed.access.service_catalog, "volume");
        assert!(matches!(result, Err(ApiError::MissingService { .. })));
    }
}
