//! Behavioural scenarios for the snapshot lifecycle.

mod snapshot;
