use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

const MINIMAL: &str = r#"
enums:
  - name: page_status
    values: [draft, published]
tables:
  - name: pages
    rls: true
    columns:
      - { name: id, type: uuid, primary_key: true }
      - { name: slug, type: text, not_null: true }
      - { name: status, type: page_status }
policies:
  - name: pages_public_read
    table: pages
    command: select
    using: "status = 'published'"
seeds:
  - table: pages
    conflict_key: [slug]
    rows:
      - { slug: home }
"#;

fn parse(yaml: &str) -> SchemaDefinition {
    SchemaDefinition::from_yaml_str(yaml, "test").unwrap()
}

#[test]
fn test_parse_minimal() {
    let def = parse(MINIMAL);
    assert_eq!(def.enums.len(), 1);
    assert_eq!(def.tables[0].columns.len(), 3);
    assert_eq!(def.policies[0].command, PolicyCommand::Select);
    assert_eq!(def.policies[0].effective_roles(), vec!["public"]);
    assert!(def.validate().is_ok());
}

#[test]
fn test_storefront_is_valid() {
    let def = SchemaDefinition::storefront().unwrap();
    assert_eq!(def.enums.len(), 5);
    assert_eq!(def.tables.len(), 12);
    for name in [
        "profiles",
        "categories",
        "products",
        "inventory",
        "carts",
        "orders",
        "invoices",
        "pages",
        "content_blocks",
        "site_settings",
    ] {
        assert!(def.table(name).is_some(), "missing table {}", name);
    }
}

#[test]
fn test_unknown_field_rejected() {
    let yaml = "tables: []\nviews: []\n";
    let err = SchemaDefinition::from_yaml_str(yaml, "test").unwrap_err();
    assert!(matches!(err, CatalogError::DefinitionParse { .. }));
}

#[test]
fn test_foreign_key_defaults_to_id() {
    let yaml = r#"
tables:
  - name: carts
    columns:
      - { name: id, type: uuid }
  - name: cart_items
    columns:
      - { name: cart_id, type: uuid, references: { table: carts, on_delete: cascade } }
"#;
    let def = parse(yaml);
    let fk = def.tables[1].columns[0].references.as_ref().unwrap();
    assert_eq!(fk.column, "id");
    assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
    assert_eq!(ReferentialAction::SetNull.as_sql(), "SET NULL");
    assert!(def.validate().is_ok());
}

#[test]
fn test_duplicate_table() {
    let yaml = r#"
tables:
  - name: pages
    columns: [{ name: id, type: uuid }]
  - name: pages
    columns: [{ name: id, type: uuid }]
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateName { ref name, .. } if name == "pages"));
}

#[test]
fn test_unknown_column_type() {
    let yaml = r#"
tables:
  - name: orders
    columns:
      - { name: status, type: order_status }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::UnknownType { ref type_name, .. } if type_name == "order_status"));
}

#[test]
fn test_parameterized_and_array_types_accepted() {
    let yaml = r#"
tables:
  - name: products
    columns:
      - { name: price, type: "numeric(10,2)" }
      - { name: tags, type: "text[]" }
      - { name: code, type: "VARCHAR(32)" }
"#;
    assert!(parse(yaml).validate().is_ok());
}

#[test]
fn test_reference_to_undeclared_table() {
    let yaml = r#"
tables:
  - name: orders
    columns:
      - { name: customer_id, type: uuid, references: { table: customers } }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::UnknownTable { ref table, .. } if table == "customers"));
}

#[test]
fn test_index_on_unknown_column() {
    let yaml = r#"
tables:
  - name: pages
    columns: [{ name: id, type: uuid }]
indexes:
  - { name: pages_slug_idx, table: pages, columns: [slug] }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::UnknownColumn { ref column, .. } if column == "slug"));
}

#[test]
fn test_policy_requires_rls_table() {
    let yaml = r#"
tables:
  - name: pages
    columns: [{ name: id, type: uuid }]
policies:
  - { name: read_all, table: pages, using: "true" }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::InvalidDefinition { .. }));
}

#[test]
fn test_seed_row_missing_conflict_key() {
    let yaml = r#"
tables:
  - name: pages
    columns:
      - { name: slug, type: text }
      - { name: title, type: text }
seeds:
  - table: pages
    conflict_key: [slug]
    rows:
      - { title: Home }
"#;
    let err = parse(yaml).validate().unwrap_err();
    match err {
        CatalogError::InvalidDefinition { message } => {
            assert!(message.contains("conflict key column 'slug'"), "{}", message);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_seed_row_unknown_column() {
    let yaml = r#"
tables:
  - name: pages
    columns: [{ name: slug, type: text }]
seeds:
  - table: pages
    conflict_key: [slug]
    rows:
      - { slug: home, colour: red }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::UnknownColumn { ref column, .. } if column == "colour"));
}

#[test]
fn test_identifier_rejected() {
    let yaml = r#"
tables:
  - name: "pages; drop table users"
    columns: [{ name: id, type: uuid }]
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::InvalidDefinition { .. }));
}

#[test]
fn test_two_primary_keys_rejected() {
    let yaml = r#"
tables:
  - name: pages
    primary_key: [slug]
    columns:
      - { name: id, type: uuid, primary_key: true }
      - { name: slug, type: text }
"#;
    let err = parse(yaml).validate().unwrap_err();
    assert!(matches!(err, CatalogError::InvalidDefinition { .. }));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();
    let def = SchemaDefinition::load(file.path()).unwrap();
    assert_eq!(def.tables[0].name, "pages");
}

#[test]
fn test_load_missing_file() {
    let err = SchemaDefinition::load(Path::new("/nonexistent/schema.yml")).unwrap_err();
    assert!(matches!(err, CatalogError::DefinitionNotFound { .. }));
}

#[test]
fn test_base_type() {
    assert_eq!(base_type("NUMERIC(10, 2)"), "numeric");
    assert_eq!(base_type("text[]"), "text");
    assert_eq!(base_type("double precision"), "double precision");
}
