//! Installation status derived from the remote database

use serde::Serialize;
use std::fmt;

/// Whether the target database has been provisioned.
///
/// Always derived from a verification read against the remote database and
/// handed to whoever needs it; never cached client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallationStatus {
    /// The verification table is missing
    NotInstalled,
    /// The verification table answered; `verified_rows` is the number of rows
    /// returned by the probe (0 or 1)
    Installed { verified_rows: usize },
    /// The probe failed for a reason other than a missing table
    Unknown { reason: String },
}

impl InstallationStatus {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallationStatus::Installed { .. })
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallationStatus::NotInstalled => write!(f, "not installed"),
            InstallationStatus::Installed { verified_rows } => {
                write!(f, "installed ({} row(s) verified)", verified_rows)
            }
            InstallationStatus::Unknown { reason } => write!(f, "unknown ({})", reason),
        }
    }
}
