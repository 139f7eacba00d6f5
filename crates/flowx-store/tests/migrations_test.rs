// Integration tests for the migration framework

use rusqlite::Connection;

fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = setup_test_db();

    // When: Migrations are applied
    let result = flowx_store::migrations::apply_migrations(&mut conn);

    // Then: All migrations succeed
    assert!(
        result.is_ok(),
        "Migrations should succeed: {:?}",
        result.err()
    );

    // And: The runtime tables exist
    let tables = get_table_names(&conn);
    for expected_table in [
        "schema_version",
        "timer_jobs",
        "jobs",
        "deployments",
        "deployment_resources",
    ] {
        assert!(
            tables.contains(&expected_table.to_string()),
            "Missing table: {}",
            expected_table
        );
    }
}

#[test]
fn test_migration_idempotency() {
    // Given: A database with migrations already applied
    let mut conn = setup_test_db();
    flowx_store::migrations::apply_migrations(&mut conn).unwrap();

    // When: Migrations are applied again
    let result = flowx_store::migrations::apply_migrations(&mut conn);

    // Then: Nothing is re-applied
    assert!(result.is_ok());
    let version_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version_count, 1, "Should have exactly 1 migration applied");
}

#[test]
fn test_migration_checksums_recorded() {
    let mut conn = setup_test_db();
    flowx_store::migrations::apply_migrations(&mut conn).unwrap();

    let checksum: String = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = '001_initial_schema'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(checksum.len(), 64, "Checksum should be SHA256 hex");
}

#[test]
fn test_resources_cascade_with_deployment() {
    let mut conn = setup_test_db();
    conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
    flowx_store::migrations::apply_migrations(&mut conn).unwrap();

    conn.execute(
        "INSERT INTO deployments (id, revision, name, version) VALUES ('d1', 1, 'orders', 1)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO deployment_resources (deployment_id, name, bytes, generated)
         VALUES ('d1', 'orders.bpmn', x'00', 0)",
        [],
    )
    .unwrap();

    conn.execute("DELETE FROM deployments WHERE id = 'd1'", [])
        .unwrap();

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM deployment_resources", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(remaining, 0);
}
