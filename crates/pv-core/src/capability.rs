//! Remote execution capability discovered at the start of a run

use serde::Serialize;
use std::fmt;

/// Whether the remote database exposes the generic execute-SQL procedure.
///
/// Computed once per run by the bootstrapper and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CapabilityState {
    /// The procedure answered the probe
    Available,
    /// The procedure was missing and has been installed during this run
    Installed,
    /// The procedure is missing and could not be installed
    Unavailable { reason: String },
}

impl CapabilityState {
    /// Whether statements may be sent through the procedure
    pub fn can_execute(&self) -> bool {
        !matches!(self, CapabilityState::Unavailable { .. })
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityState::Available => write!(f, "available"),
            CapabilityState::Installed => write!(f, "installed"),
            CapabilityState::Unavailable { reason } => write!(f, "unavailable ({})", reason),
        }
    }
}
