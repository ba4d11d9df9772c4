//! Layered settings for credentials and run behaviour.
//!
//! Credentials live in [`ScalewayConfig`] and share the `SCW_` variables used
//! by the official Scaleway tooling. Run behaviour lives in [`FleetConfig`],
//! which is discovered from `snapctl.toml` and `SNAPCTL_` variables.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::orchestrator::DEFAULT_SNAPSHOT_DESCRIPTION;

/// Scaleway credentials and scoping derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SCW")]
pub struct ScalewayConfig {
    /// Access key assigned to the Scaleway application. Not needed for API
    /// calls.
    pub access_key: Option<String>,
    /// API secret sent as `X-Auth-Token`. Required.
    pub secret_key: String,
    /// Organisation identifier used by some Scaleway endpoints.
    pub default_organization_id: Option<String>,
    /// Project whose instances are listed and which owns new snapshots.
    pub default_project_id: String,
    /// Availability zone to operate in. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
}

/// Longest accepted wait for one power transition (one day).
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 86_400;
/// Longest accepted delay between state polls.
pub const MAX_POLL_INTERVAL_SECS: u64 = 3_600;
/// Largest page the Scaleway list endpoints accept.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Run behaviour shared by every command.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNAPCTL",
    discovery(
        app_name = "snapctl",
        env_var = "SNAPCTL_CONFIG_PATH",
        config_file_name = "snapctl.toml",
        dotfile_name = ".snapctl.toml",
        project_file_name = "snapctl.toml"
    )
)]
pub struct FleetConfig {
    /// Upper bound in seconds for each wait on a power transition.
    #[ortho_config(default = 300)]
    pub wait_timeout_secs: u64,
    /// Delay in seconds between state polls while waiting.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Provenance description attached to every snapshot.
    #[ortho_config(default = DEFAULT_SNAPSHOT_DESCRIPTION.to_owned())]
    pub snapshot_description: String,
    /// Number of records requested per page when listing resources.
    #[ortho_config(default = 50)]
    pub page_size: u32,
}

/// Where a setting comes from, quoted back to the operator when it is wrong.
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

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in snapctl.toml",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }

    fn out_of_range(&self, max: u64) -> ConfigError {
        ConfigError::OutOfRange(format!(
            "{} must be between 1 and {max}: check {} or {} in [{}]",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }
}

fn require_text(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn require_range(value: u64, max: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(metadata.out_of_range(max));
    }
    Ok(())
}

impl ScalewayConfig {
    /// Merges defaults, discovered files and `SCW_` variables. Command-line
    /// arguments belong to the binary's own parser and are ignored here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("snapctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that the credentials and scope needed for API calls are present.
    /// Each error names the variable and `snapctl.toml` key to set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text(
            &self.secret_key,
            &FieldMetadata::new(
                "Scaleway API secret key",
                "SCW_SECRET_KEY",
                "secret_key",
                "scaleway",
            ),
        )?;
        require_text(
            &self.default_project_id,
            &FieldMetadata::new(
                "Scaleway project ID",
                "SCW_DEFAULT_PROJECT_ID",
                "default_project_id",
                "scaleway",
            ),
        )?;
        require_text(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "SCW_DEFAULT_ZONE",
                "default_zone",
                "scaleway",
            ),
        )
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 300,
            poll_interval_secs: 5,
            snapshot_description: String::from(DEFAULT_SNAPSHOT_DESCRIPTION),
            page_size: 50,
        }
    }
}

impl FleetConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("snapctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Rejects durations and page sizes outside their bounds and a blank
    /// description.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_range(
            self.wait_timeout_secs,
            MAX_WAIT_TIMEOUT_SECS,
            &FieldMetadata::new(
                "wait timeout",
                "SNAPCTL_WAIT_TIMEOUT_SECS",
                "wait_timeout_secs",
                "snapctl",
            ),
        )?;
        require_range(
            self.poll_interval_secs,
            MAX_POLL_INTERVAL_SECS,
            &FieldMetadata::new(
                "poll interval",
                "SNAPCTL_POLL_INTERVAL_SECS",
                "poll_interval_secs",
                "snapctl",
            ),
        )?;
        require_range(
            u64::from(self.page_size),
            MAX_PAGE_SIZE,
            &FieldMetadata::new("page size", "SNAPCTL_PAGE_SIZE", "page_size", "snapctl"),
        )?;
        require_text(
            &self.snapshot_description,
            &FieldMetadata::new(
                "snapshot description",
                "SNAPCTL_SNAPSHOT_DESCRIPTION",
                "snapshot_description",
                "snapctl",
            ),
        )
    }

    /// Returns the wait timeout as a [`Duration`].
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Returns the poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Configuration failures, reported before any provider call.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required setting is blank.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a numeric setting is outside its allowed range.
    #[error("invalid configuration value: {0}")]
    OutOfRange(String),
    /// The layered loader rejected a source.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
