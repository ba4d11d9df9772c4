//! Power-off and power-on requests for the Scaleway fleet adapter.

use crate::provider::{Instance, PowerState};
use crate::scaleway::types::{Action, POWER_OFF, POWER_ON};

use super::super::{ScalewayFleet, ScalewayFleetError};
use super::ServerStatus;

/// Direction of a power request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(in crate::scaleway) enum PowerRequest {
    Off,
    On,
}

impl PowerRequest {
    const fn action(self) -> &'static str {
        match self {
            Self::Off => POWER_OFF,
            Self::On => POWER_ON,
        }
    }

    /// States in which the request has nothing left to do.
    const fn satisfied_by(self, state: PowerState) -> bool {
        match self {
            Self::Off => matches!(state, PowerState::Stopped | PowerState::Stopping),
            Self::On => matches!(state, PowerState::Running | PowerState::Pending),
        }
    }

    fn refused(self, status: &ServerStatus) -> ScalewayFleetError {
        let instance_id = status.id.clone();
        let state = status.state.as_str().to_owned();
        match self {
            Self::Off => ScalewayFleetError::PowerOffNotAllowed { instance_id, state },
            Self::On => ScalewayFleetError::PowerOnNotAllowed { instance_id, state },
        }
    }
}

/// Decides whether `request` must be sent for a server in `status`.
///
/// Returns `Ok(false)` when the server is already at or moving towards the
/// requested state.
pub(in crate::scaleway) fn needs_action(
    request: PowerRequest,
    status: &ServerStatus,
) -> Result<bool, ScalewayFleetError> {
    let state = status
        .state
        .power_state()
        .ok_or_else(|| ScalewayFleetError::UnknownState {
            instance_id: status.id.clone(),
            state: status.state.as_str().to_owned(),
        })?;

    if request.satisfied_by(state) {
        return Ok(false);
    }

    if status
        .allowed_actions
        .iter()
        .any(|action| action.as_str() == request.action())
    {
        return Ok(true);
    }

    Err(request.refused(status))
}

impl ScalewayFleet {
    pub(in crate::scaleway) async fn fetch_status(
        &self,
        instance: &Instance,
    ) -> Result<ServerStatus, ScalewayFleetError> {
        let mut servers = self
            .api
            .list_instances(&instance.availability_zone)
            .servers(&instance.id)
            .per_page(1)
            .run_async()
            .await?;

        servers
            .pop()
            .map(|server| ServerStatus {
                id: server.id,
                state: server.state.into(),
                allowed_actions: server
                    .allowed_actions
                    .into_iter()
                    .map(Action::from)
                    .collect(),
            })
            .ok_or_else(|| ScalewayFleetError::InstanceNotFound {
                instance_id: instance.id.clone(),
                zone: instance.availability_zone.clone(),
            })
    }

    pub(in crate::scaleway) async fn request_power(
        &self,
        instance: &Instance,
        request: PowerRequest,
    ) -> Result<(), ScalewayFleetError> {
        let status = self.fetch_status(instance).await?;
        if !needs_action(request, &status)? {
            tracing::debug!(
                instance_id = %instance.id,
                state = %status.state.as_str(),
                action = request.action(),
                "power request already satisfied"
            );
            return Ok(());
        }

        self.api
            .perform_instance_action_async(
                &instance.availability_zone,
                &instance.id,
                request.action(),
            )
            .await?;
        Ok(())
    }
}
