//! End-to-end migration runs against the scripted database

use pv_catalog::{build_schema, CatalogParams, SchemaDefinition};
use pv_core::{CapabilityState, InstallationStatus, SchemaDescription, StatementKind};
use pv_engine::testing::{Call, RecordingReporter, ScriptedDatabase};
use pv_engine::{
    run_migration, run_migration_with, Completion, EngineSettings, NullReporter, Orchestrator,
    ReporterEvent, Verification,
};

const SMALL: &str = r#"
enums:
  - name: order_status
    values: [pending, paid]
  - name: page_status
    values: [draft, published]
tables:
  - name: orders
    rls: true
    columns:
      - { name: id, type: uuid, primary_key: true, default: "gen_random_uuid()" }
      - { name: profile_id, type: uuid, references: { table: profiles, on_delete: cascade } }
      - { name: status, type: order_status, not_null: true, default: "'pending'" }
  - name: profiles
    rls: true
    columns:
      - { name: id, type: uuid, primary_key: true }
      - { name: email, type: text, not_null: true, unique: true }
  - name: pages
    rls: true
    columns:
      - { name: id, type: uuid, primary_key: true, default: "gen_random_uuid()" }
      - { name: slug, type: text, not_null: true, unique: true }
      - { name: status, type: page_status, not_null: true, default: "'draft'" }
indexes:
  - { name: orders_profile_idx, table: orders, columns: [profile_id] }
policies:
  - name: orders_select_own
    table: orders
    command: select
    roles: [authenticated]
    using: "auth.uid() = profile_id"
  - name: pages_public_read
    table: pages
    command: select
    roles: [anon, authenticated]
    using: "status = 'published'"
seeds:
  - table: pages
    conflict_key: [slug]
    rows:
      - { slug: home, status: published }
      - { slug: about, status: draft }
"#;

const CREATE_ORDER_STATUS: &str = "CREATE TYPE \"public\".\"order_status\"";

fn small_definition() -> SchemaDefinition {
    SchemaDefinition::from_yaml_str(SMALL, "small").unwrap()
}

fn small_schema() -> SchemaDescription {
    build_schema(&small_definition(), &CatalogParams::default()).unwrap()
}

fn all_sql(schema: &SchemaDescription) -> Vec<String> {
    schema.statements().map(|(_, s)| s.sql.clone()).collect()
}

// ── Existing enum on a fresh run ────────────────────────────────────────

#[tokio::test]
async fn test_existing_enum_counts_as_success() {
    let db = ScriptedDatabase::new()
        .fail_always(CREATE_ORDER_STATUS, "type \"order_status\" already exists");
    let settings = EngineSettings::default();
    let mut reporter = RecordingReporter::new();

    let result = run_migration_with(&db, &mut reporter, &settings, &small_definition())
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.summary.total, 13);
    assert_eq!(result.summary.skipped_existing, 1);
    assert_eq!(result.summary.succeeded, 12);

    let progress = reporter.progress();
    assert_eq!(progress.len(), 13);
    assert_eq!(progress.last(), Some(&100));

    assert_eq!(
        reporter.events.first(),
        Some(&ReporterEvent::Success {
            message: "Create enum type order_status".to_string()
        })
    );
    assert!(reporter.errors().is_empty());
    assert_eq!(result.completion(), Completion::Success);
}

// ── Order preservation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_statements_run_in_catalog_order() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let schema = small_schema();

    Orchestrator::new(&db, &settings)
        .run(&schema, &mut NullReporter)
        .await
        .unwrap();

    assert_eq!(db.executed_sql(), all_sql(&schema));
}

#[tokio::test(start_paused = true)]
async fn test_order_preserved_when_statements_fail() {
    let db = ScriptedDatabase::new().fail_always("\"orders_profile_idx\"", "permission denied");
    let settings = EngineSettings::default();
    let schema = small_schema();

    let result = Orchestrator::new(&db, &settings)
        .run(&schema, &mut NullReporter)
        .await
        .unwrap();

    // The failing index is attempted three times in place
    let mut expected = Vec::new();
    for sql in all_sql(&schema) {
        let repeats = if sql.contains("\"orders_profile_idx\"") { 3 } else { 1 };
        for _ in 0..repeats {
            expected.push(sql.clone());
        }
    }
    assert_eq!(db.executed_sql(), expected);
    assert_eq!(result.summary.completed, 13);
    assert_eq!(result.errors.len(), 1);
}

// ── Idempotence ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_skips_every_definition() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let definition = small_definition();

    let first = run_migration_with(&db, &mut NullReporter, &settings, &definition)
        .await
        .unwrap();
    let second = run_migration_with(&db, &mut NullReporter, &settings, &definition)
        .await
        .unwrap();

    let schema = build_schema(&definition, &settings.catalog_params()).unwrap();
    let seeds = schema.of_kind(StatementKind::SeedData).len();

    assert!(first.success);
    assert!(second.success);
    assert_eq!(second.summary.skipped_existing, schema.definition_count());
    assert_eq!(second.summary.succeeded, seeds);
    assert_eq!(seeds, 2);
    assert_ne!(first.run_id, second.run_id);
}

// ── Retry bound ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failing_statement_is_attempted_max_times() {
    let db = ScriptedDatabase::new().fail_always("\"pages_public_read\"", "connection reset by peer");
    let mut settings = EngineSettings::default();
    settings.retry.max_attempts = 4;
    let mut reporter = RecordingReporter::new();

    let result = run_migration_with(&db, &mut reporter, &settings, &small_definition())
        .await
        .unwrap();

    assert_eq!(db.attempts_for("\"pages_public_read\""), 4);
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Create policy \"pages_public_read\" on pages: "));
    // Later statements still ran
    assert_eq!(result.summary.completed, 13);
    assert_eq!(reporter.errors().len(), 1);
    assert_eq!(result.completion(), Completion::CompletedWithWarnings);
}

// ── Progress ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_progress_is_monotonic_and_paired() {
    let db = ScriptedDatabase::new().fail_always("\"orders_profile_idx\"", "permission denied");
    let settings = EngineSettings::default();
    let mut reporter = RecordingReporter::new();

    run_migration_with(&db, &mut reporter, &settings, &small_definition())
        .await
        .unwrap();

    let progress = reporter.progress();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress[..progress.len() - 1].iter().all(|p| *p < 100));

    // Every statement emits one outcome event then one progress event
    assert_eq!(reporter.events.len(), 26);
    for pair in reporter.events.chunks(2) {
        assert!(!matches!(pair[0], ReporterEvent::Progress { .. }));
        assert!(matches!(pair[1], ReporterEvent::Progress { .. }));
    }
}

#[tokio::test]
async fn test_progress_labels_follow_statements() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let schema = small_schema();
    let mut reporter = RecordingReporter::new();

    Orchestrator::new(&db, &settings)
        .run(&schema, &mut reporter)
        .await
        .unwrap();

    let labels: Vec<String> = reporter
        .events
        .iter()
        .filter_map(|e| match e {
            ReporterEvent::Progress { label, .. } => Some(label.clone()),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = schema.statements().map(|(_, s)| s.label.clone()).collect();
    assert_eq!(labels, expected);
}

// ── Missing capability ──────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_procedure_is_installed() {
    let db = ScriptedDatabase::without_procedure(true);
    let settings = EngineSettings::default();

    let result = run_migration_with(&db, &mut NullReporter, &settings, &small_definition())
        .await
        .unwrap();

    assert_eq!(result.capability, CapabilityState::Installed);
    assert!(result.success);
    assert_eq!(result.summary.via_fallback, 0);
}

#[tokio::test]
async fn test_missing_procedure_degrades_to_data_api() {
    let db = ScriptedDatabase::without_procedure(false);
    let settings = EngineSettings::default();
    let schema = small_schema();
    let mut reporter = RecordingReporter::new();

    let result = Orchestrator::new(&db, &settings)
        .run(&schema, &mut reporter)
        .await
        .unwrap();

    assert!(matches!(result.capability, CapabilityState::Unavailable { .. }));
    assert!(!result.success);
    assert_eq!(result.errors.len(), schema.definition_count());
    assert!(result
        .errors
        .iter()
        .all(|e| e.contains("no data-API fallback applies")));

    // Seeds went through the table API
    assert_eq!(result.summary.via_fallback, 2);
    assert_eq!(db.rows("pages").len(), 2);
    let inserts = db
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Insert { .. }))
        .count();
    assert_eq!(inserts, schema.of_kind(StatementKind::SeedData).len());

    // Every statement still reported
    assert_eq!(reporter.progress().len(), 13);
    assert_eq!(result.verification, Verification::Verified { rows: 1 });
    assert_eq!(
        result.installation,
        InstallationStatus::Installed { verified_rows: 1 }
    );
}

// ── Built-in catalog ────────────────────────────────────────────────────

#[tokio::test]
async fn test_storefront_migration() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default();
    let mut reporter = RecordingReporter::new();

    let result = run_migration(&db, &mut reporter, &settings).await.unwrap();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.summary.total, 55);
    assert_eq!(result.summary.completed, 55);
    assert_eq!(reporter.progress().len(), 55);
    assert_eq!(result.verification, Verification::Verified { rows: 0 });
    assert!(result.banner().starts_with("Database setup complete"));
}

#[tokio::test]
async fn test_storefront_in_custom_schema() {
    let db = ScriptedDatabase::new();
    let settings = EngineSettings::default().with_schema("shop");

    let result = run_migration(&db, &mut NullReporter, &settings).await.unwrap();

    assert!(result.success);
    assert!(db
        .executed_sql()
        .iter()
        .filter(|sql| sql.contains("CREATE TABLE"))
        .all(|sql| sql.contains("\"shop\".")));
}
