use super::*;
use crate::testing::{Call, ScriptedDatabase};
use pv_core::{DataRequest, OnConflict, Row};
use serde_json::json;

const CREATE_PAGES: &str =
    "CREATE TABLE IF NOT EXISTS \"public\".\"pages\" (\n  \"id\" uuid PRIMARY KEY\n)";

fn table_statement() -> Statement {
    Statement::new("Create table pages", CREATE_PAGES)
}

fn seed_row() -> Row {
    let mut row = Row::new();
    row.insert("slug".to_string(), json!("home"));
    row.insert("title".to_string(), json!("Home"));
    row
}

fn seed_statement(on_conflict: OnConflict) -> Statement {
    Statement::new(
        "Seed pages (slug=home)",
        "INSERT INTO \"public\".\"pages\" (\"slug\", \"title\") VALUES ('home', 'Home') ON CONFLICT (\"slug\") DO NOTHING",
    )
    .with_data_request(DataRequest::Insert {
        table: "pages".to_string(),
        rows: vec![seed_row()],
        on_conflict,
        conflict_columns: vec!["slug".to_string()],
    })
}

fn unavailable() -> CapabilityState {
    CapabilityState::Unavailable {
        reason: "procedure exec_sql not found".to_string(),
    }
}

#[tokio::test]
async fn test_success_on_first_attempt() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::Success);
    assert_eq!(report.path, ExecutionPath::Procedure);
    assert_eq!(report.attempts, 1);
    assert!(!report.fallback_attempted);
    assert_eq!(db.executed_sql(), vec![CREATE_PAGES.to_string()]);
}

#[tokio::test]
async fn test_repeat_is_skipped_as_existing() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let executor = Executor::new(&db, &settings);

    let first = executor
        .execute(&table_statement(), &CapabilityState::Available)
        .await;
    let second = executor
        .execute(&table_statement(), &CapabilityState::Available)
        .await;

    assert_eq!(first.outcome, ExecutionOutcome::Success);
    assert_eq!(second.outcome, ExecutionOutcome::SkippedAlreadyExists);
    assert_eq!(second.attempts, 1);
}

#[tokio::test]
async fn test_repeated_seed_insert_succeeds() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let executor = Executor::new(&db, &settings);
    let seed = seed_statement(OnConflict::Ignore);

    let first = executor.execute(&seed, &CapabilityState::Available).await;
    let second = executor.execute(&seed, &CapabilityState::Available).await;

    assert_eq!(first.outcome, ExecutionOutcome::Success);
    assert_eq!(second.outcome, ExecutionOutcome::Success);
    assert_eq!(second.path, ExecutionPath::Procedure);
    assert_eq!(db.attempts_for("ON CONFLICT"), 2);
}

#[tokio::test]
async fn test_already_exists_marker_is_not_retried() {
    let db = ScriptedDatabase::new().fail_always("order_status", "type \"order_status\" already exists");
    let settings = EngineSettings::default();
    let statement = Statement::new(
        "Create enum type order_status",
        "CREATE TYPE \"public\".\"order_status\" AS ENUM ('pending')",
    );

    let report = execute(&db, &statement, &CapabilityState::Available, &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::SkippedAlreadyExists);
    assert_eq!(db.attempts_for("order_status"), 1);
}

#[tokio::test]
async fn test_already_exists_code_is_not_retried() {
    let db = ScriptedDatabase::new().fail_with_code("pages", "42P07", "relation exists");
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::SkippedAlreadyExists);
    assert_eq!(report.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let db = ScriptedDatabase::new().fail_always("pages", "upstream timed out");
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.attempts, 3);
    assert_eq!(db.attempts_for("pages"), 3);
    assert_eq!(report.path, ExecutionPath::Procedure);
    match report.outcome {
        ExecutionOutcome::Failed { message } => assert!(message.contains("upstream timed out")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers() {
    let db = ScriptedDatabase::new().fail_times("pages", "upstream timed out", 2);
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::Success);
    assert_eq!(report.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts() {
    let db = ScriptedDatabase::new().fail_always("pages", "upstream timed out");
    let settings = EngineSettings::default();
    let started = tokio::time::Instant::now();

    execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    // 1s after the first failure, 2s after the second, none after the last
    let elapsed = started.elapsed();
    assert!(elapsed >= std::time::Duration::from_millis(3000));
    assert!(elapsed < std::time::Duration::from_millis(4000));
}

#[tokio::test]
async fn test_single_attempt_setting() {
    let db = ScriptedDatabase::new().fail_always("pages", "upstream timed out");
    let mut settings = EngineSettings::default();
    settings.retry.max_attempts = 1;

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.attempts, 1);
    assert!(!report.outcome.is_ok());
}

#[tokio::test]
async fn test_missing_procedure_stops_retrying() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &CapabilityState::Available, &settings).await;

    assert_eq!(report.attempts, 1);
    assert!(!report.fallback_attempted);
    match report.outcome {
        ExecutionOutcome::Failed { message } => assert!(message.contains("exec_sql")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_procedure_falls_back_for_seed() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();

    let report = execute(
        &db,
        &seed_statement(OnConflict::Ignore),
        &CapabilityState::Available,
        &settings,
    )
    .await;

    assert_eq!(report.outcome, ExecutionOutcome::Success);
    assert_eq!(report.path, ExecutionPath::DataApi);
    assert_eq!(report.attempts, 1);
    assert!(report.fallback_attempted);
    assert_eq!(db.rows("pages"), vec![seed_row()]);
}

#[tokio::test]
async fn test_unavailable_capability_uses_data_api_only() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();

    let report = execute(&db, &seed_statement(OnConflict::Ignore), &unavailable(), &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::Success);
    assert_eq!(report.path, ExecutionPath::DataApi);
    assert_eq!(report.attempts, 0);
    assert_eq!(
        db.calls(),
        vec![Call::Insert {
            table: "pages".to_string(),
            rows: 1
        }]
    );
}

#[tokio::test]
async fn test_unavailable_capability_fails_definitions() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();

    let report = execute(&db, &table_statement(), &unavailable(), &settings).await;

    assert_eq!(report.path, ExecutionPath::None);
    assert_eq!(report.attempts, 0);
    assert!(db.calls().is_empty());
    match report.outcome {
        ExecutionOutcome::Failed { message } => {
            assert!(message.contains("unavailable"));
            assert!(message.contains("no data-API fallback"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_definition_with_data_request_gets_no_fallback() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();
    let statement = table_statement().with_data_request(DataRequest::Select {
        table: "pages".to_string(),
        limit: 1,
    });

    let report = execute(&db, &statement, &unavailable(), &settings).await;

    assert!(!report.fallback_attempted);
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn test_data_api_duplicate_counts_as_existing() {
    let db = ScriptedDatabase::without_procedure(false).with_table("pages", vec![seed_row()]);
    let settings = EngineSettings::default();

    let report = execute(&db, &seed_statement(OnConflict::Error), &unavailable(), &settings).await;

    assert_eq!(report.outcome, ExecutionOutcome::SkippedAlreadyExists);
    assert_eq!(report.path, ExecutionPath::DataApi);
}

#[tokio::test]
async fn test_data_api_failure_is_reported() {
    let db = ScriptedDatabase::without_procedure(false).fail_data_api("permission denied for table pages");
    let settings = EngineSettings::default();

    let report = execute(&db, &seed_statement(OnConflict::Ignore), &unavailable(), &settings).await;

    assert_eq!(report.path, ExecutionPath::DataApi);
    assert_eq!(
        report.outcome.error_message().map(|m| m.contains("permission denied")),
        Some(true)
    );
}
