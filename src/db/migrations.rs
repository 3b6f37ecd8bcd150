use rusqlite::Connection;

use super::DbError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenants and mcp records",
        sql: r#"
CREATE TABLE tenant_t (
    tenant_id   TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE mcp_record_t (
    mcp_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id   TEXT NOT NULL,
    mcp_name    TEXT NOT NULL,
    mcp_server  TEXT NOT NULL,
    status      INTEGER NOT NULL DEFAULT 0,
    created_by  TEXT,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    UNIQUE (tenant_id, mcp_name)
);

CREATE INDEX idx_mcp_record_tenant ON mcp_record_t(tenant_id);
"#,
    },
    Migration {
        version: 2,
        name: "tool catalog and instances",
        sql: r#"
CREATE TABLE tool_info_t (
    tool_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id    TEXT NOT NULL,
    name         TEXT NOT NULL,
    origin_name  TEXT NOT NULL,
    class_name   TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    source       TEXT NOT NULL,
    author       TEXT,
    usage        TEXT,
    params_json  TEXT NOT NULL DEFAULT '[]',
    inputs       TEXT NOT NULL DEFAULT '{}',
    output_type  TEXT NOT NULL DEFAULT 'string',
    category     TEXT,
    is_available INTEGER NOT NULL DEFAULT 1,
    created_by   TEXT,
    create_time  TEXT NOT NULL,
    update_time  TEXT NOT NULL,
    UNIQUE (tenant_id, name, source)
);

CREATE INDEX idx_tool_info_tenant ON tool_info_t(tenant_id);

CREATE TABLE tool_instance_t (
    tool_instance_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tool_id          INTEGER NOT NULL REFERENCES tool_info_t(tool_id),
    agent_id         INTEGER NOT NULL,
    params_json      TEXT NOT NULL DEFAULT '{}',
    user_id          TEXT,
    tenant_id        TEXT NOT NULL,
    enabled          INTEGER NOT NULL DEFAULT 0,
    create_time      TEXT NOT NULL,
    update_time      TEXT NOT NULL,
    UNIQUE (tenant_id, agent_id, tool_id)
);

CREATE INDEX idx_tool_instance_tool ON tool_instance_t(tool_id, tenant_id);
"#,
    },
];

/// Apply every migration newer than the highest recorded version, each in
/// its own transaction.
pub(super) fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(version = migration.version, "applying migration: {}", migration.name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            DbError::Migration(format!("v{} ({}): {e}", migration.version, migration.name))
        })?;
        tx.execute(
            "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
    }

    Ok(())
}
