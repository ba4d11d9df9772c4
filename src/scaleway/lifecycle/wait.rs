//! Bounded waits for power transitions.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, sleep};

use crate::provider::{Instance, PowerState};

use super::super::{ScalewayFleet, ScalewayFleetError};

/// Polls `read_state` until it reports `target` or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. State read errors end the wait immediately.
pub(in crate::scaleway) async fn poll_for_state<F, Fut>(
    mut read_state: F,
    target: PowerState,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<bool, ScalewayFleetError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PowerState, ScalewayFleetError>>,
{
    let polling = async {
        loop {
            if read_state().await? == target {
                return Ok::<(), ScalewayFleetError>(());
            }
            sleep(poll_interval).await;
        }
    };

    match time::timeout(timeout, polling).await {
        Ok(settled) => settled.map(|()| true),
        Err(_elapsed) => Ok(false),
    }
}

impl ScalewayFleet {
    async fn current_power_state(
        &self,
        instance: &Instance,
    ) -> Result<PowerState, ScalewayFleetError> {
        let status = self.fetch_status(instance).await?;
        status
            .state
            .power_state()
            .ok_or_else(|| ScalewayFleetError::UnknownState {
                instance_id: status.id.clone(),
                state: status.state.as_str().to_owned(),
            })
    }

    pub(in crate::scaleway) async fn wait_for_power_state(
        &self,
        instance: &Instance,
        target: PowerState,
        action: &str,
    ) -> Result<(), ScalewayFleetError> {
        let reached = poll_for_state(
            || self.current_power_state(instance),
            target,
            self.poll_interval,
            self.wait_timeout,
        )
        .await?;

        if reached {
            return Ok(());
        }

        Err(ScalewayFleetError::Timeout {
            action: action.to_owned(),
            instance_id: instance.id.clone(),
        })
    }
}
