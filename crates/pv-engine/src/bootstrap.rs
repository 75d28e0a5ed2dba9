//! Capability bootstrap
//!
//! Detects whether the remote database exposes the execute-SQL procedure
//! and, when it does not, tries to install it through the same call. A
//! failure here only degrades the run; it is never fatal.

use crate::settings::EngineSettings;
use pv_catalog::exec_procedure_sql;
use pv_core::CapabilityState;
use pv_db::RemoteProcedure;

/// Harmless statement used to probe the procedure
pub const PROBE_SQL: &str = "SELECT 1";

/// Probe for the procedure, installing it if missing.
///
/// Any answer other than "procedure not found" counts as available. Safe to
/// call on every run.
pub async fn ensure_exec_capability<D>(db: &D, settings: &EngineSettings) -> CapabilityState
where
    D: RemoteProcedure + ?Sized,
{
    let name = settings.procedure_name.as_str();
    let probe = settings.procedure_payload(PROBE_SQL);

    match db.call_procedure(name, &probe).await {
        Ok(_) => {
            log::debug!("Procedure {} answered the probe", name);
            return CapabilityState::Available;
        }
        Err(err) if !err.is_procedure_missing() => {
            log::warn!(
                "Procedure {} probe returned an error, assuming it exists: {}",
                name,
                err
            );
            return CapabilityState::Available;
        }
        Err(err) => {
            log::warn!("Procedure {} not found, attempting install: {}", name, err);
        }
    }

    let install_sql = match exec_procedure_sql(&settings.catalog_params()) {
        Ok(sql) => sql,
        Err(err) => {
            log::warn!("Cannot render procedure {}: {}", name, err);
            return CapabilityState::Unavailable {
                reason: err.to_string(),
            };
        }
    };

    if let Err(err) = db
        .call_procedure(name, &settings.procedure_payload(&install_sql))
        .await
    {
        log::warn!("Installing procedure {} failed: {}", name, err);
    }

    match db.call_procedure(name, &probe).await {
        Err(err) if err.is_procedure_missing() => {
            log::warn!(
                "Procedure {} still missing; continuing with data-API fallback only",
                name
            );
            CapabilityState::Unavailable {
                reason: format!("procedure {} not found and could not be installed", name),
            }
        }
        Err(err) => {
            log::warn!(
                "Procedure {} re-probe returned an error, assuming it exists: {}",
                name,
                err
            );
            CapabilityState::Available
        }
        Ok(_) => {
            log::info!("Installed procedure {}", name);
            CapabilityState::Installed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, ScriptedDatabase};

    #[tokio::test]
    async fn test_available() {
        let db = ScriptedDatabase::new();
        let state = ensure_exec_capability(&db, &EngineSettings::default()).await;
        assert_eq!(state, CapabilityState::Available);
        assert_eq!(db.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_installs_missing_procedure() {
        let db = ScriptedDatabase::without_procedure(true);
        let state = ensure_exec_capability(&db, &EngineSettings::default()).await;
        assert_eq!(state, CapabilityState::Installed);
        assert!(db.procedure_present());

        let calls = db.calls();
        assert_eq!(calls.len(), 3);
        match &calls[1] {
            Call::Procedure { sql: Some(sql), .. } => {
                assert!(sql.starts_with("CREATE OR REPLACE FUNCTION"));
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_reprobe_is_not_installed() {
        let db = ScriptedDatabase::without_procedure(true).fail_times(
            PROBE_SQL,
            "upstream connect error",
            1,
        );
        let state = ensure_exec_capability(&db, &EngineSettings::default()).await;
        assert_eq!(state, CapabilityState::Available);
        assert_eq!(db.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_when_install_fails() {
        let db = ScriptedDatabase::without_procedure(false);
        let state = ensure_exec_capability(&db, &EngineSettings::default()).await;
        assert!(matches!(state, CapabilityState::Unavailable { .. }));
        assert!(!state.can_execute());
    }

    #[tokio::test]
    async fn test_idempotent() {
        let db = ScriptedDatabase::without_procedure(true);
        let settings = EngineSettings::default();
        assert_eq!(
            ensure_exec_capability(&db, &settings).await,
            CapabilityState::Installed
        );
        assert_eq!(
            ensure_exec_capability(&db, &settings).await,
            CapabilityState::Available
        );
    }

    #[tokio::test]
    async fn test_other_errors_count_as_available() {
        let db = ScriptedDatabase::new().disconnected();
        let state = ensure_exec_capability(&db, &EngineSettings::default()).await;
        assert_eq!(state, CapabilityState::Available);
    }
}
