//! Bulk import of `cv_*` tables from an external SQLite snapshot.
//!
//! The snapshot is attached to the store connection and each recognized table
//! is copied row by row in its own transaction. Import is an idempotent
//! upsert keyed by `id`, so rerunning it against the same snapshot leaves the
//! local tables unchanged.
//!
//! Snapshots may hold flattened columns, a `data` column with the whole
//! upstream object as JSON, or both. A table offering neither is skipped.

use std::path::Path;

use serde::Serialize;
use tokio_rusqlite::rusqlite::{self, Transaction, types::Value as SqlValue};

use super::connection::Store;
use crate::Error;
use crate::resource::{DATA_COLUMN, ResourceSpec, ResourceType};

/// Rows copied from one snapshot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableImport {
    pub table: String,
    pub rows: u64,
}

/// The table that stopped an import, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub table: String,
    pub message: String,
}

/// Outcome of one import run.
///
/// Tables listed in `tables` were committed. When `failure` is set the named
/// table was rolled back and every table after it was left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub tables: Vec<TableImport>,
    pub skipped: Vec<String>,
    pub failure: Option<ImportFailure>,
}

impl ImportSummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

impl Store {
    /// Import every recognized table from the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Import` if the snapshot is missing or cannot be read as
    /// a SQLite database. A malformed row is not an error: it is reported in
    /// the summary's `failure`.
    pub async fn import_snapshot(&self, path: impl AsRef<Path>) -> Result<ImportSummary, Error> {
        let path = path.as_ref().to_path_buf();

        let summary = self
            .conn
            .call(move |conn| -> Result<ImportSummary, Error> {
                if !path.is_file() {
                    return Err(Error::Import(format!("snapshot not found: {}", path.display())));
                }
                let snapshot = path.to_string_lossy().into_owned();
                conn.execute("ATTACH DATABASE ?1 AS snapshot", [&snapshot])
                    .map_err(|e| Error::Import(format!("cannot attach {snapshot}: {e}")))?;

                let result = import_attached(conn);

                if let Err(e) = conn.execute_batch("DETACH DATABASE snapshot") {
                    tracing::warn!(error = %e, "failed to detach snapshot");
                }
                result
            })
            .await
            .map_err(Error::from)?;

        tracing::info!(
            tables = summary.tables.len(),
            rows = summary.total_rows(),
            skipped = summary.skipped.len(),
            complete = summary.is_complete(),
            "snapshot import finished"
        );
        Ok(summary)
    }
}

fn import_attached(conn: &mut rusqlite::Connection) -> Result<ImportSummary, Error> {
    let tables = snapshot_tables(conn).map_err(|e| Error::Import(format!("cannot read snapshot: {e}")))?;
    let mut summary = ImportSummary::default();

    for table in tables {
        let Some(resource_type) = ResourceType::from_table(&table) else {
            tracing::warn!(table = %table, "skipping unrecognized snapshot table");
            summary.skipped.push(table);
            continue;
        };

        match import_table(conn, resource_type.spec()) {
            Ok(None) => {
                tracing::warn!(table = %table, "skipping snapshot table with no importable columns besides id");
                summary.skipped.push(table);
            }
            Ok(Some(rows)) => {
                tracing::debug!(table = %table, rows, "imported table");
                summary.tables.push(TableImport { table, rows });
            }
            Err(message) => {
                tracing::warn!(table = %table, %message, "import aborted");
                summary.failure = Some(ImportFailure { table, message });
                break;
            }
        }
    }

    Ok(summary)
}

fn snapshot_tables(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM snapshot.sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
    )?;
    let names = stmt.query_map([], |row| row.get(0))?;
    names.collect()
}

fn snapshot_columns(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA snapshot.table_info(\"{table}\")"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    names.collect()
}

/// Copy one table inside a transaction; rolls back on any failure.
///
/// Returns None when the snapshot table shares no column with the local
/// table other than `id`.
fn import_table(conn: &mut rusqlite::Connection, spec: &ResourceSpec) -> Result<Option<u64>, String> {
    let available = snapshot_columns(conn, spec.table).map_err(|e| e.to_string())?;
    if !available.iter().any(|c| c == "id") {
        return Err("snapshot table has no id column".into());
    }
    let columns: Vec<&str> = spec
        .fields()
        .map(|f| f.column)
        .chain(std::iter::once(DATA_COLUMN))
        .filter(|c| available.iter().any(|a| a == c))
        .collect();
    if columns.len() < 2 {
        return Ok(None);
    }

    let tx = conn.transaction().map_err(|e| e.to_string())?;
    let rows = copy_rows(&tx, spec.table, &columns)?;
    tx.commit().map_err(|e| e.to_string())?;
    Ok(Some(rows))
}

fn copy_rows(tx: &Transaction<'_>, table: &str, columns: &[&str]) -> Result<u64, String> {
    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("\"{c}\" = excluded.\"{c}\""))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let mut insert = tx
        .prepare(&format!(
            "INSERT INTO main.\"{table}\" ({}) VALUES ({}) ON CONFLICT(\"id\") {conflict}",
            quoted.join(", "),
            placeholders.join(", ")
        ))
        .map_err(|e| e.to_string())?;

    let mut select = tx
        .prepare(&format!("SELECT {} FROM snapshot.\"{table}\"", quoted.join(", ")))
        .map_err(|e| e.to_string())?;
    let id_index = columns.iter().position(|c| *c == "id").unwrap_or(0);
    let data_index = columns.iter().position(|c| *c == DATA_COLUMN);

    let mut rows = select.query([]).map_err(|e| e.to_string())?;
    let mut copied = 0u64;
    while let Some(row) = rows.next().map_err(|e| e.to_string())? {
        let mut values: Vec<SqlValue> = (0..columns.len())
            .map(|i| row.get::<_, SqlValue>(i))
            .collect::<rusqlite::Result<_>>()
            .map_err(|e| e.to_string())?;
        let id = normalize_id(&values[id_index])
            .ok_or_else(|| format!("row {}: id {:?} is not an integer", copied + 1, values[id_index]))?;
        values[id_index] = id;
        if let Some(i) = data_index
            && !is_json_object_or_null(&values[i])
        {
            return Err(format!("row {}: data is not a JSON object", copied + 1));
        }

        insert
            .execute(rusqlite::params_from_iter(values.iter()))
            .map_err(|e| format!("row {}: {e}", copied + 1))?;
        copied += 1;
    }

    Ok(copied)
}

fn is_json_object_or_null(value: &SqlValue) -> bool {
    match value {
        SqlValue::Null => true,
        SqlValue::Text(raw) => matches!(serde_json::from_str::<serde_json::Value>(raw), Ok(serde_json::Value::Object(_))),
        _ => false,
    }
}

fn normalize_id(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Integer(id) => Some(SqlValue::Integer(*id)),
        SqlValue::Text(raw) => raw.trim().parse::<i64>().ok().map(SqlValue::Integer),
        _ => None,
    }
}
