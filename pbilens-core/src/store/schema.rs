/// Current schema version.
pub const SCHEMA_VERSION: &str = "2";

/// Full SQL schema for the pbilens `SQLite` database.
///
/// Child collections live in JSON text columns on the project row; every read
/// pattern loads whole projects and filters in memory.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS pbilens_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per analyzed project
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    file_path TEXT NOT NULL,
    file_hash TEXT NOT NULL,
    last_analyzed TEXT NOT NULL,
    model_size INTEGER NOT NULL DEFAULT 0,
    tables_data TEXT,
    metadata_data TEXT,
    schema_data TEXT,
    measures_data TEXT,
    relationships_data TEXT,
    queries_data TEXT
);
CREATE INDEX IF NOT EXISTS idx_projects_last_analyzed ON projects(last_analyzed);
";

/// `SQLite` PRAGMAs for a single-user local database.
pub const PRAGMAS_SQL: &str = r"
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -16000;
PRAGMA foreign_keys = ON;
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_executes_on_in_memory_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(PRAGMAS_SQL).unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"projects".to_string()));
        assert!(tables.contains(&"pbilens_meta".to_string()));
    }

    #[test]
    fn project_names_are_unique() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        let insert = "INSERT INTO projects (name, file_path, file_hash, last_analyzed)
                      VALUES ('A', 'a.pbix', 'h', '2025-01-01T00:00:00Z')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
