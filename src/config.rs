//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Authentication parameters for the two control planes, derived from
/// environment variables, configuration files, and CLI flags.
///
/// The `OS` prefix follows the platform's conventional variable names
/// (`OS_USERNAME`, `OS_PASSWORD`, `OS_TENANT_NAME`, `OS_AUTH_URL`). These
/// four values are the whole construction-time surface; no other options
/// are recognised.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OS")]
pub struct OpenStackConfig {
    /// User name used for identity authentication.
    pub username: String,
    /// Password for the user. Required.
    pub password: String,
    /// Project tenant the resources are scoped to.
    pub tenant_name: String,
    /// Identity endpoint URL, for example `http://127.0.0.1:5000/v2.0/`.
    pub auth_url: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl OpenStackConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in volia.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("volia")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.username,
            &FieldMetadata::new("authentication user", "OS_USERNAME", "username", "openstack"),
        )?;
        Self::require_field(
            &self.password,
            &FieldMetadata::new(
                "authentication password",
                "OS_PASSWORD",
                "password",
                "openstack",
            ),
        )?;
        Self::require_field(
            &self.tenant_name,
            &FieldMetadata::new(
                "project tenant",
                "OS_TENANT_NAME",
                "tenant_name",
                "openstack",
            ),
        )?;
        Self::require_field(
            &self.auth_url,
            &FieldMetadata::new("identity endpoint", "OS_AUTH_URL", "auth_url", "openstack"),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenStackConfig {
        OpenStackConfig {
            username: String::from("admin"),
            password: String::from("secret"),
            tenant_name: String::from("admin"),
            auth_url: String::from("http://127.0.0.1:5000/v2.0/"),
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn validate_names_the_missing_field() {
        let incomplete = OpenStackConfig {
            password: String::from("  "),
            ..config()
        };
        let err = incomplete.validate().expect_err("blank password");
        assert!(
            matches!(err, ConfigError::MissingField(ref message) if message.contains("OS_PASSWORD")),
            "unexpected error: {err}"
        );
    }
}
