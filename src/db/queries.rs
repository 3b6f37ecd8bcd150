use std::collections::HashSet;

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DbError};
use crate::core::tool::{ParamDescriptor, ToolDescriptor, ToolSource};

// Fixed-width timestamps so `ORDER BY update_time` sorts chronologically.
fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// Row types: flat structs that map directly to table columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct McpRecordRow {
    pub mcp_id: i64,
    pub tenant_id: String,
    pub mcp_name: String,
    pub mcp_server: String,
    pub status: bool,
    pub created_by: Option<String>,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfoRow {
    pub tool_id: i64,
    pub tenant_id: String,
    pub name: String,
    pub origin_name: String,
    pub class_name: String,
    pub description: String,
    pub source: String,
    pub author: Option<String>,
    pub usage: Option<String>,
    pub params_json: String,
    pub inputs: String,
    pub output_type: String,
    pub category: Option<String>,
    pub is_available: bool,
    pub created_by: Option<String>,
    pub create_time: String,
    pub update_time: String,
}

impl ToolInfoRow {
    pub fn params(&self) -> Result<Vec<ParamDescriptor>, DbError> {
        serde_json::from_str(&self.params_json)
            .map_err(|e| DbError::Serialization(format!("tool {} params: {e}", self.tool_id)))
    }

    pub fn descriptor(&self) -> Result<ToolDescriptor, DbError> {
        let source = self
            .source
            .parse::<ToolSource>()
            .map_err(DbError::Serialization)?;
        Ok(ToolDescriptor {
            name: self.name.clone(),
            origin_name: self.origin_name.clone(),
            description: self.description.clone(),
            source,
            params: self.params()?,
            inputs: self.inputs.clone(),
            output_type: self.output_type.clone(),
            class_name: self.class_name.clone(),
            usage: self.usage.clone(),
            category: self.category.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInstanceRow {
    pub tool_instance_id: i64,
    pub tool_id: i64,
    pub agent_id: i64,
    pub params_json: String,
    pub user_id: Option<String>,
    pub tenant_id: String,
    pub enabled: bool,
    pub create_time: String,
    pub update_time: String,
}

impl ToolInstanceRow {
    pub fn params(&self) -> Result<serde_json::Value, DbError> {
        serde_json::from_str(&self.params_json).map_err(|e| {
            DbError::Serialization(format!("tool instance {} params: {e}", self.tool_instance_id))
        })
    }
}

/// Values written by an instance upsert.
#[derive(Debug, Clone)]
pub struct ToolInstanceUpsert {
    pub tool_id: i64,
    pub agent_id: i64,
    pub params: serde_json::Value,
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

pub fn insert_tenant(db: &Database, tenant_id: &str) -> Result<(), DbError> {
    let conn = db.conn();
    conn.execute(
        "INSERT INTO tenant_t (tenant_id, created_at) VALUES (?1, ?2)
         ON CONFLICT(tenant_id) DO NOTHING",
        params![tenant_id, now()],
    )?;
    Ok(())
}

pub fn list_all_tenant_ids(db: &Database) -> Result<Vec<String>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare("SELECT tenant_id FROM tenant_t ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Remote MCP server records
// ---------------------------------------------------------------------------

fn map_mcp_record(row: &Row<'_>) -> rusqlite::Result<McpRecordRow> {
    Ok(McpRecordRow {
        mcp_id: row.get(0)?,
        tenant_id: row.get(1)?,
        mcp_name: row.get(2)?,
        mcp_server: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        create_time: row.get(6)?,
        update_time: row.get(7)?,
    })
}

/// Register a server for a tenant, or repoint an existing registration.
pub fn upsert_mcp_record(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    mcp_name: &str,
    mcp_server: &str,
    status: bool,
) -> Result<(), DbError> {
    let conn = db.conn();
    let ts = now();
    conn.execute(
        "INSERT INTO mcp_record_t
            (tenant_id, mcp_name, mcp_server, status, created_by, create_time, update_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(tenant_id, mcp_name)
         DO UPDATE SET
             mcp_server = excluded.mcp_server,
             status = excluded.status,
             update_time = excluded.update_time",
        params![tenant_id, mcp_name, mcp_server, status, user_id, ts],
    )?;
    Ok(())
}

pub fn update_mcp_record_status(
    db: &Database,
    tenant_id: &str,
    mcp_name: &str,
    status: bool,
) -> Result<(), DbError> {
    let conn = db.conn();
    let changed = conn.execute(
        "UPDATE mcp_record_t SET status = ?1, update_time = ?2
         WHERE tenant_id = ?3 AND mcp_name = ?4",
        params![status, now(), tenant_id, mcp_name],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!(
            "mcp server {mcp_name} for tenant {tenant_id}"
        )));
    }
    Ok(())
}

pub fn get_mcp_records_by_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<McpRecordRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT mcp_id, tenant_id, mcp_name, mcp_server, status, created_by, create_time, update_time
         FROM mcp_record_t WHERE tenant_id = ?1 ORDER BY mcp_id",
    )?;
    let rows = stmt
        .query_map(params![tenant_id], map_mcp_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_mcp_server_by_name_and_tenant(
    db: &Database,
    mcp_name: &str,
    tenant_id: &str,
) -> Result<Option<String>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT mcp_server FROM mcp_record_t WHERE mcp_name = ?1 AND tenant_id = ?2",
    )?;
    let mut rows = stmt.query_map(params![mcp_name, tenant_id], |row| row.get(0))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tool catalog
// ---------------------------------------------------------------------------

const TOOL_INFO_COLUMNS: &str = "tool_id, tenant_id, name, origin_name, class_name, description, \
     source, author, usage, params_json, inputs, output_type, category, is_available, \
     created_by, create_time, update_time";

fn map_tool_info(row: &Row<'_>) -> rusqlite::Result<ToolInfoRow> {
    Ok(ToolInfoRow {
        tool_id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        origin_name: row.get(3)?,
        class_name: row.get(4)?,
        description: row.get(5)?,
        source: row.get(6)?,
        author: row.get(7)?,
        usage: row.get(8)?,
        params_json: row.get(9)?,
        inputs: row.get(10)?,
        output_type: row.get(11)?,
        category: row.get(12)?,
        is_available: row.get(13)?,
        created_by: row.get(14)?,
        create_time: row.get(15)?,
        update_time: row.get(16)?,
    })
}

/// Replace a tenant's catalog with the result of a scan.
///
/// Rows are matched on (name, source). Matches are refreshed in place and keep
/// their `tool_id`; rows missing from `tools` are marked unavailable; new tools
/// are inserted. The first occurrence of a repeated identity wins. Returns the
/// number of distinct tools written.
pub fn upsert_catalog(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
    tools: &[ToolDescriptor],
) -> Result<usize, DbError> {
    let ts = now();
    db.transaction(|tx| {
        tx.execute(
            "UPDATE tool_info_t SET is_available = 0, update_time = ?1 WHERE tenant_id = ?2",
            params![ts, tenant_id],
        )?;

        let mut seen: HashSet<(&str, ToolSource)> = HashSet::new();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tool_info_t
                    (tenant_id, name, origin_name, class_name, description, source, author, usage,
                     params_json, inputs, output_type, category, is_available, created_by,
                     create_time, update_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?7, ?13, ?13)
                 ON CONFLICT(tenant_id, name, source)
                 DO UPDATE SET
                     origin_name = excluded.origin_name,
                     class_name = excluded.class_name,
                     description = excluded.description,
                     usage = excluded.usage,
                     params_json = excluded.params_json,
                     inputs = excluded.inputs,
                     output_type = excluded.output_type,
                     category = excluded.category,
                     is_available = 1,
                     update_time = excluded.update_time",
            )?;

            for tool in tools {
                if !seen.insert((tool.name.as_str(), tool.source)) {
                    tracing::debug!(
                        tool = %tool.name,
                        source = %tool.source,
                        "duplicate tool identity in scan, keeping first"
                    );
                    continue;
                }
                let params_json = serde_json::to_string(&tool.params)?;
                stmt.execute(params![
                    tenant_id,
                    tool.name,
                    tool.origin_name,
                    tool.class_name,
                    tool.description,
                    tool.source.as_str(),
                    user_id,
                    tool.usage,
                    params_json,
                    tool.inputs,
                    tool.output_type,
                    tool.category,
                    ts,
                ])?;
            }
        }

        Ok(seen.len())
    })
}

/// Every catalog row of a tenant, available or not, in insertion order.
pub fn query_all_tools(db: &Database, tenant_id: &str) -> Result<Vec<ToolInfoRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOOL_INFO_COLUMNS} FROM tool_info_t WHERE tenant_id = ?1 ORDER BY tool_id"
    ))?;
    let rows = stmt
        .query_map(params![tenant_id], map_tool_info)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_available_tools(db: &Database, tenant_id: &str) -> Result<usize, DbError> {
    let conn = db.conn();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tool_info_t WHERE tenant_id = ?1 AND is_available = 1",
        params![tenant_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn get_tool_info(
    db: &Database,
    tool_id: i64,
    tenant_id: &str,
) -> Result<Option<ToolInfoRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOOL_INFO_COLUMNS} FROM tool_info_t WHERE tool_id = ?1 AND tenant_id = ?2"
    ))?;
    let mut rows = stmt.query_map(params![tool_id, tenant_id], map_tool_info)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tool instances
// ---------------------------------------------------------------------------

const TOOL_INSTANCE_COLUMNS: &str = "tool_instance_id, tool_id, agent_id, params_json, user_id, \
     tenant_id, enabled, create_time, update_time";

fn map_tool_instance(row: &Row<'_>) -> rusqlite::Result<ToolInstanceRow> {
    Ok(ToolInstanceRow {
        tool_instance_id: row.get(0)?,
        tool_id: row.get(1)?,
        agent_id: row.get(2)?,
        params_json: row.get(3)?,
        user_id: row.get(4)?,
        tenant_id: row.get(5)?,
        enabled: row.get(6)?,
        create_time: row.get(7)?,
        update_time: row.get(8)?,
    })
}

pub fn query_tool_instance(
    db: &Database,
    agent_id: i64,
    tool_id: i64,
    tenant_id: &str,
) -> Result<Option<ToolInstanceRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOOL_INSTANCE_COLUMNS} FROM tool_instance_t
         WHERE agent_id = ?1 AND tool_id = ?2 AND tenant_id = ?3"
    ))?;
    let mut rows = stmt.query_map(params![agent_id, tool_id, tenant_id], map_tool_instance)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Create the (agent, tool) instance on first save, update it in place afterwards.
pub fn upsert_tool_instance(
    db: &Database,
    instance: &ToolInstanceUpsert,
    tenant_id: &str,
    user_id: &str,
) -> Result<ToolInstanceRow, DbError> {
    let params_json = serde_json::to_string(&instance.params)?;
    {
        let conn = db.conn();
        conn.execute(
            "INSERT INTO tool_instance_t
                (tool_id, agent_id, params_json, user_id, tenant_id, enabled, create_time, update_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(tenant_id, agent_id, tool_id)
             DO UPDATE SET
                 params_json = excluded.params_json,
                 user_id = excluded.user_id,
                 enabled = excluded.enabled,
                 update_time = excluded.update_time",
            params![
                instance.tool_id,
                instance.agent_id,
                params_json,
                user_id,
                tenant_id,
                instance.enabled,
                now(),
            ],
        )?;
    }

    query_tool_instance(db, instance.agent_id, instance.tool_id, tenant_id)?.ok_or_else(|| {
        DbError::NotFound(format!(
            "tool instance agent={} tool={}",
            instance.agent_id, instance.tool_id
        ))
    })
}

/// Most recently saved instance of a tool by this user, across all agents.
pub fn query_last_tool_instance(
    db: &Database,
    tool_id: i64,
    tenant_id: &str,
    user_id: &str,
) -> Result<Option<ToolInstanceRow>, DbError> {
    let conn = db.conn();
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOOL_INSTANCE_COLUMNS} FROM tool_instance_t
         WHERE tool_id = ?1 AND tenant_id = ?2 AND user_id = ?3
         ORDER BY update_time DESC, tool_instance_id DESC
         LIMIT 1"
    ))?;
    let mut rows = stmt.query_map(params![tool_id, tenant_id, user_id], map_tool_instance)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}
