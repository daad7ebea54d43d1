//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema. The local
//! resource tables are derived from the field mapping and created after the
//! versioned migrations on every open.

use std::num::ParseIntError;

use super::Error;
use crate::resource::{DATA_COLUMN, RESOURCES, ResourceSpec};
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. The version number is an
/// incrementing integer used to track which migrations have been applied.
/// All migrations are idempotent using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[
    ("1", include_str!("../../migrations/001_api_cache.sql")),
    ("2", include_str!("../../migrations/002_images.sql")),
];

/// Run any pending migrations, then make sure every `cv_*` table exists.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                conn.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
            }
        }

        for spec in RESOURCES {
            conn.execute_batch(&local_table_ddl(spec))
                .map_err(|e| Error::MigrationFailed(format!("{}: {e}", spec.table)))?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// `CREATE TABLE IF NOT EXISTS` for one resource type's local table.
pub(crate) fn local_table_ddl(spec: &ResourceSpec) -> String {
    let columns: Vec<String> = spec
        .fields()
        .map(|f| {
            if f.column == "id" {
                "\"id\" INTEGER PRIMARY KEY".to_string()
            } else {
                format!("\"{}\" {}", f.column, f.kind.sql_type())
            }
        })
        .chain(std::iter::once(format!("\"{DATA_COLUMN}\" TEXT")))
        .collect();
    format!("CREATE TABLE IF NOT EXISTS \"{}\" ({});", spec.table, columns.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceType;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let has_cache: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='api_cache')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert!(has_cache);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_every_local_table_created() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'cv\\_%' ESCAPE '\\'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert_eq!(count, RESOURCES.len() as i64);
    }

    #[test]
    fn test_local_table_ddl_quotes_columns() {
        let ddl = local_table_ddl(ResourceType::Video.spec());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"cv_video\""));
        assert!(ddl.contains("\"id\" INTEGER PRIMARY KEY"));
        assert!(ddl.contains("\"user\" TEXT"));
        assert!(ddl.contains("\"length_seconds\" INTEGER"));
        assert!(ddl.ends_with("\"data\" TEXT);"));
    }
}
