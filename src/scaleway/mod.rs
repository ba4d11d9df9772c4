//! Scaleway implementation of the fleet provider.

mod error;
mod lifecycle;
mod types;
mod wire;

use std::time::Duration;

use scaleway_rs::ScalewayApi;

use crate::config::{FleetConfig, ScalewayConfig};
use crate::provider::{
    FleetProvider, Instance, PowerState, ProviderFuture, Snapshot, TagFilter, Volume,
};
use lifecycle::PowerRequest;

pub use error::ScalewayFleetError;

/// Fleet provider backed by the Scaleway Instances API.
#[derive(Clone)]
pub struct ScalewayFleet {
    api: ScalewayApi,
    config: ScalewayConfig,
    api_base: String,
    page_size: u32,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ScalewayFleet {
    /// Constructs a provider from credentials and run settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayFleetError::Config`] when either configuration fails
    /// validation.
    pub fn new(config: ScalewayConfig, settings: &FleetConfig) -> Result<Self, ScalewayFleetError> {
        config.validate()?;
        settings.validate()?;
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            config,
            api_base: String::from(lifecycle::SCALEWAY_INSTANCE_API_BASE),
            page_size: settings.page_size,
            poll_interval: settings.poll_interval(),
            wait_timeout: settings.wait_timeout(),
        })
    }

    /// Zone the provider enumerates instances in.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.config.default_zone
    }
}

impl FleetProvider for ScalewayFleet {
    type Error = ScalewayFleetError;

    fn list_instances<'a>(
        &'a self,
        filter: Option<&'a TagFilter>,
    ) -> ProviderFuture<'a, Vec<Instance>, Self::Error> {
        Box::pin(async move { self.list_servers(filter).await })
    }

    fn stop<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.request_power(instance, PowerRequest::Off).await })
    }

    fn start<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.request_power(instance, PowerRequest::On).await })
    }

    fn wait_until_stopped<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.wait_for_power_state(instance, PowerState::Stopped, "wait_until_stopped")
                .await
        })
    }

    fn wait_until_running<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.wait_for_power_state(instance, PowerState::Running, "wait_until_running")
                .await
        })
    }

    fn list_volumes<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error> {
        Box::pin(async move { self.server_volumes(instance).await })
    }

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
        description: &'a str,
    ) -> ProviderFuture<'a, Snapshot, Self::Error> {
        Box::pin(async move { self.request_snapshot(volume, description).await })
    }

    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error> {
        Box::pin(async move { self.volume_snapshots(volume).await })
    }
}
