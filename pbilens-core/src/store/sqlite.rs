use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use crate::error::{PbilensError, StoreError};
use crate::types::{
    CatalogEntry, ModelSummary, NewProject, ProjectBlobs, ProjectId, ProjectRef, ProjectSummary,
    StoredProject,
};

use super::MetadataStore;
use super::schema;

/// Tables from the normalized layout that predates JSON blobs.
const LEGACY_TABLES: [&str; 5] = [
    "\"columns\"",
    "\"tables\"",
    "measures",
    "relationships",
    "power_queries",
];

/// SQLite-backed implementation of `MetadataStore`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Size of the database file on disk, 0 for in-memory stores.
    pub fn db_size_bytes(&self) -> u64 {
        self.db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.lock();

        conn.execute_batch(schema::PRAGMAS_SQL)
            .map_err(StoreError::Sqlite)?;

        // Try WAL mode; in-memory databases ignore it
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        Self::drop_legacy_layout(&conn).map_err(|e| StoreError::Migration(e.to_string()))?;

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        Self::ensure_queries_column(&conn).map_err(|e| StoreError::Migration(e.to_string()))?;

        conn.execute(
            "INSERT INTO pbilens_meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(())
    }

    fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for name in names {
            if name? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
    }

    /// A `projects` table without `tables_data` belongs to the normalized
    /// layout; its rows cannot be carried over, so it is dropped along with
    /// its child tables and the project must be re-analyzed.
    fn drop_legacy_layout(conn: &Connection) -> rusqlite::Result<()> {
        if !Self::table_exists(conn, "projects")? || Self::has_column(conn, "projects", "tables_data")?
        {
            return Ok(());
        }
        warn!("Dropping legacy normalized project tables; re-analyze files to repopulate");
        for table in LEGACY_TABLES {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
        }
        conn.execute_batch("DROP TABLE IF EXISTS projects;")?;
        Ok(())
    }

    /// Stores created before Power Query capture lack `queries_data`.
    fn ensure_queries_column(conn: &Connection) -> rusqlite::Result<()> {
        if !Self::has_column(conn, "projects", "queries_data")? {
            conn.execute("ALTER TABLE projects ADD COLUMN queries_data TEXT", [])?;
        }
        Ok(())
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        // Fixed-width so text ordering matches time ordering.
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).map_or_else(
            |_| {
                warn!(value = s, "Unparseable last_analyzed timestamp");
                DateTime::<Utc>::default()
            },
            |dt| dt.with_timezone(&Utc),
        )
    }

    fn size_from_sql(v: i64) -> u64 {
        u64::try_from(v).unwrap_or(0)
    }

    fn size_to_sql(v: u64) -> i64 {
        i64::try_from(v).unwrap_or(i64::MAX)
    }

    /// Helper: read a full project from a `SELECT *` row.
    fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredProject> {
        let last_analyzed: String = row.get("last_analyzed")?;
        Ok(StoredProject {
            id: ProjectId(row.get("id")?),
            name: row.get("name")?,
            file_path: row.get("file_path")?,
            file_hash: row.get("file_hash")?,
            last_analyzed: Self::parse_timestamp(&last_analyzed),
            model_size: Self::size_from_sql(row.get("model_size")?),
            blobs: ProjectBlobs {
                tables: row.get("tables_data")?,
                metadata: row.get("metadata_data")?,
                schema: row.get("schema_data")?,
                measures: row.get("measures_data")?,
                relationships: row.get("relationships_data")?,
                queries: row.get("queries_data")?,
            },
        })
    }

    /// Helper: read a listing row, reducing the metadata blob to counts.
    fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectSummary> {
        let name: String = row.get("name")?;
        let last_analyzed: String = row.get("last_analyzed")?;
        let metadata: Option<String> = row.get("metadata_data")?;
        let summary = metadata
            .as_deref()
            .map(|text| {
                serde_json::from_str::<ModelSummary>(text).unwrap_or_else(|e| {
                    warn!(project = %name, error = %e, "Skipping corrupt metadata blob");
                    ModelSummary::default()
                })
            })
            .unwrap_or_default();

        Ok(ProjectSummary {
            id: ProjectId(row.get("id")?),
            name,
            file_path: row.get("file_path")?,
            file_hash: row.get("file_hash")?,
            last_analyzed: Self::parse_timestamp(&last_analyzed),
            model_size: Self::size_from_sql(row.get("model_size")?),
            table_count: summary.table_count,
            measure_count: summary.measure_count,
        })
    }

    fn encode_blobs(project: &NewProject) -> Result<ProjectBlobs, StoreError> {
        let model = &project.model;
        Ok(ProjectBlobs {
            tables: Some(serde_json::to_string(&model.tables)?),
            metadata: Some(serde_json::to_string(&model.metadata)?),
            schema: Some(serde_json::to_string(&model.schema)?),
            measures: Some(serde_json::to_string(&model.measures)?),
            relationships: Some(serde_json::to_string(&model.relationships)?),
            queries: Some(serde_json::to_string(&model.queries)?),
        })
    }
}

#[async_trait::async_trait]
impl MetadataStore for SqliteStore {
    // ── Writes ─────────────────────────────────────────────────────

    async fn upsert_project(&self, project: &NewProject) -> crate::error::Result<ProjectId> {
        let blobs = Self::encode_blobs(project)?;
        let conn = self.lock();
        // Dropping `tx` without commit rolls back, so the old row survives any
        // failure between the delete and the insert.
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;

        let replaced = tx
            .execute("DELETE FROM projects WHERE name = ?1", params![project.name])
            .map_err(StoreError::Sqlite)?;

        tx.execute(
            "INSERT INTO projects
                (name, file_path, file_hash, last_analyzed, model_size,
                 tables_data, metadata_data, schema_data, measures_data,
                 relationships_data, queries_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                project.name,
                project.file_path.display().to_string(),
                project.file_hash,
                Self::format_timestamp(&project.last_analyzed),
                Self::size_to_sql(project.model_size),
                blobs.tables,
                blobs.metadata,
                blobs.schema,
                blobs.measures,
                blobs.relationships,
                blobs.queries,
            ],
        )
        .map_err(StoreError::Sqlite)?;
        let id = tx.last_insert_rowid();

        tx.commit().map_err(StoreError::Sqlite)?;
        debug!(project = %project.name, id, replaced, "Stored project");
        Ok(ProjectId(id))
    }

    async fn delete_project(&self, project: &ProjectRef) -> crate::error::Result<bool> {
        let conn = self.lock();
        let count = match project {
            ProjectRef::Id(id) => conn.execute("DELETE FROM projects WHERE id = ?1", params![id.0]),
            ProjectRef::Name(name) => {
                conn.execute("DELETE FROM projects WHERE name = ?1", params![name])
            }
        }
        .map_err(StoreError::Sqlite)?;
        Ok(count > 0)
    }

    async fn clear(&self) -> crate::error::Result<u64> {
        let conn = self.lock();
        let count = conn
            .execute("DELETE FROM projects", [])
            .map_err(StoreError::Sqlite)?;
        Ok(count as u64)
    }

    // ── Reads ──────────────────────────────────────────────────────

    async fn find_project(&self, name: &str) -> crate::error::Result<Option<StoredProject>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM projects WHERE name = ?1",
            params![name],
            Self::row_to_project,
        )
        .optional()
        .map_err(StoreError::Sqlite)
        .map_err(PbilensError::Store)
    }

    async fn list_projects(&self) -> crate::error::Result<Vec<ProjectSummary>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, file_path, file_hash, last_analyzed, model_size, metadata_data
                 FROM projects ORDER BY last_analyzed DESC, id DESC",
            )
            .map_err(StoreError::Sqlite)?;
        let projects = stmt
            .query_map([], Self::row_to_summary)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(projects)
    }

    async fn load_catalog(&self) -> crate::error::Result<Vec<CatalogEntry>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT name, tables_data, measures_data FROM projects ORDER BY id")
            .map_err(StoreError::Sqlite)?;
        let entries = stmt
            .query_map([], |row| {
                Ok(CatalogEntry {
                    project: row.get(0)?,
                    tables: row.get(1)?,
                    measures: row.get(2)?,
                })
            })
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::{ExtractedModel, MeasureInfo, TableInfo};

    fn table(name: &str) -> TableInfo {
        TableInfo {
            name: name.to_string(),
            row_count: 10,
            column_count: 0,
            columns: Vec::new(),
        }
    }

    fn make_project(name: &str, hash: &str, tables: &[&str]) -> NewProject {
        let tables: Vec<TableInfo> = tables.iter().map(|t| table(t)).collect();
        NewProject {
            name: name.to_string(),
            file_path: PathBuf::from(format!("/models/{name}.pbix")),
            file_hash: hash.to_string(),
            last_analyzed: Utc::now(),
            model_size: 2048,
            model: ExtractedModel {
                metadata: ModelSummary {
                    table_count: tables.len() as u64,
                    ..ModelSummary::default()
                },
                tables,
                ..ExtractedModel::default()
            },
        }
    }

    #[tokio::test]
    async fn upsert_and_find_project() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .upsert_project(&make_project("Finance", "abc", &["Sales", "Date"]))
            .await
            .unwrap();
        assert!(id.0 > 0);

        let fetched = store.find_project("Finance").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.file_hash, "abc");
        assert_eq!(fetched.model_size, 2048);
        let tables: Vec<TableInfo> =
            serde_json::from_str(fetched.blobs.tables.as_deref().unwrap()).unwrap();
        assert_eq!(tables.len(), 2);
        assert!(store.find_project("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_previous_row_for_same_name() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_project(&make_project("Finance", "v1", &["Sales", "Budget"]))
            .await
            .unwrap();
        let mut second = make_project("Finance", "v2", &["Ledger"]);
        second.model.measures.push(MeasureInfo {
            table_name: "Ledger".into(),
            name: "Balance".into(),
            expression: "SUM(Ledger[Amount])".into(),
        });
        store.upsert_project(&second).await.unwrap();

        let listed = store.list_projects().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_hash, "v2");
        assert_eq!(listed[0].table_count, 1);

        let catalog = store.load_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        let tables: Vec<TableInfo> =
            serde_json::from_str(catalog[0].tables.as_deref().unwrap()).unwrap();
        assert_eq!(tables, vec![table("Ledger")]);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_the_delete() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_project(&make_project("Fragile", "v1", &["Sales"]))
            .await
            .unwrap();
        store
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_v2 BEFORE INSERT ON projects
                 WHEN NEW.file_hash = 'v2'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store
            .upsert_project(&make_project("Fragile", "v2", &["Other"]))
            .await;
        assert!(result.is_err());

        let kept = store.find_project("Fragile").await.unwrap().unwrap();
        assert_eq!(kept.file_hash, "v1");
    }

    #[tokio::test]
    async fn list_projects_orders_most_recent_first() {
        let store = SqliteStore::in_memory().unwrap();
        for (name, day) in [("Old", 1), ("Newest", 20), ("Middle", 10)] {
            let mut p = make_project(name, "h", &[]);
            p.last_analyzed = Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
            store.upsert_project(&p).await.unwrap();
        }
        let names: Vec<String> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Newest", "Middle", "Old"]);
    }

    #[tokio::test]
    async fn delete_by_id_and_by_name() {
        let store = SqliteStore::in_memory().unwrap();
        let a = store.upsert_project(&make_project("A", "h", &[])).await.unwrap();
        store.upsert_project(&make_project("B", "h", &[])).await.unwrap();

        assert!(store.delete_project(&ProjectRef::Id(a)).await.unwrap());
        assert!(
            store
                .delete_project(&ProjectRef::Name("B".into()))
                .await
                .unwrap()
        );
        assert!(
            !store
                .delete_project(&ProjectRef::Name("B".into()))
                .await
                .unwrap()
        );
        assert!(store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_project(&make_project("A", "h", &[])).await.unwrap();
        store.upsert_project(&make_project("B", "h", &[])).await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.load_catalog().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_follows_storage_order() {
        let store = SqliteStore::in_memory().unwrap();
        for name in ["Zeta", "Alpha", "Mid"] {
            store.upsert_project(&make_project(name, "h", &["T"])).await.unwrap();
        }
        let names: Vec<String> = store
            .load_catalog()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.project)
            .collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mid"]);
    }

    #[tokio::test]
    async fn corrupt_metadata_blob_lists_with_zero_counts() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_project(&make_project("A", "h", &["T"])).await.unwrap();
        store
            .lock()
            .execute("UPDATE projects SET metadata_data = '{not json'", [])
            .unwrap();
        let listed = store.list_projects().await.unwrap();
        assert_eq!(listed[0].table_count, 0);
    }

    #[tokio::test]
    async fn opening_legacy_normalized_db_recreates_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT UNIQUE, file_path TEXT, file_hash TEXT,
                    last_analyzed TIMESTAMP, model_size INTEGER,
                    table_count INTEGER, measure_count INTEGER);
                 CREATE TABLE \"tables\" (id INTEGER PRIMARY KEY, project_id INTEGER, table_name TEXT);
                 INSERT INTO projects (name, file_path, file_hash) VALUES ('Old', 'old.pbix', 'x');",
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.list_projects().await.unwrap().is_empty());
        {
            let conn = store.lock();
            assert!(SqliteStore::has_column(&conn, "projects", "queries_data").unwrap());
            assert!(!SqliteStore::table_exists(&conn, "tables").unwrap());
        }
        store.upsert_project(&make_project("New", "h", &["T"])).await.unwrap();
        assert!(store.db_size_bytes() > 0);
    }

    #[tokio::test]
    async fn store_missing_queries_column_is_upgraded_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE, file_path TEXT NOT NULL,
                    file_hash TEXT NOT NULL, last_analyzed TEXT NOT NULL,
                    model_size INTEGER NOT NULL DEFAULT 0,
                    tables_data TEXT, metadata_data TEXT, schema_data TEXT,
                    measures_data TEXT, relationships_data TEXT);
                 INSERT INTO projects (name, file_path, file_hash, last_analyzed, tables_data)
                 VALUES ('Kept', 'kept.pbix', 'x', '2025-01-01T00:00:00.000000Z', '[]');",
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let kept = store.find_project("Kept").await.unwrap().unwrap();
        assert!(kept.blobs.queries.is_none());
        assert_eq!(kept.blobs.tables.as_deref(), Some("[]"));
    }
}
