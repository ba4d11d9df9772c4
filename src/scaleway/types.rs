//! Newtypes for Scaleway API values to avoid stringly-typed code.

use std::ops::Deref;

use crate::provider::{PowerState, SnapshotState};

macro_rules! newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub(crate) struct $name(String);

        impl $name {
            pub(crate) const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }
    };
}

newtype!(ServerState);
newtype!(Action);
newtype!(SnapshotStatus);

/// Action name that powers a server off.
pub(crate) const POWER_OFF: &str = "poweroff";
/// Action name that powers a server on.
pub(crate) const POWER_ON: &str = "poweron";

impl ServerState {
    /// Maps the Scaleway server state onto the provider-neutral power state.
    ///
    /// `locked` servers are mid-operation on the provider side and are
    /// reported as pending. Unknown strings return `None`.
    pub(crate) fn power_state(&self) -> Option<PowerState> {
        match self.as_str() {
            "starting" | "locked" => Some(PowerState::Pending),
            "running" => Some(PowerState::Running),
            "stopping" => Some(PowerState::Stopping),
            "stopped" | "stopped in place" => Some(PowerState::Stopped),
            _ => None,
        }
    }
}

impl SnapshotStatus {
    /// Maps the Scaleway snapshot state onto the provider-neutral one.
    /// Transitional and unknown states count as pending.
    pub(crate) fn snapshot_state(&self) -> SnapshotState {
        match self.as_str() {
            "available" => SnapshotState::Completed,
            "error" | "invalid_data" => SnapshotState::Error,
            _ => SnapshotState::Pending,
        }
    }
}
