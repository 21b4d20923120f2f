use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Typed ID wrappers ──────────────────────────────────────────────

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(ProjectId);

// ── Model records ──────────────────────────────────────────────────

/// A table in a Power BI data model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u64,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// A column belonging to a [`TableInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default = "unknown")]
    pub data_type: String,
    #[serde(default)]
    pub is_calculated: bool,
}

/// A DAX measure. The expression is an opaque string and may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureInfo {
    #[serde(default = "unknown")]
    pub table_name: String,
    pub name: String,
    #[serde(default)]
    pub expression: String,
}

/// A declared link between two table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipInfo {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    #[serde(default = "unknown")]
    pub cardinality: String,
}

/// A Power Query (M) expression that loads data into the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerQueryInfo {
    pub name: String,
    #[serde(default)]
    pub expression: String,
}

/// Counts stored alongside each project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    #[serde(default)]
    pub table_count: u64,
    #[serde(default)]
    pub measure_count: u64,
    #[serde(default)]
    pub relationship_count: u64,
    #[serde(default)]
    pub model_size: u64,
}

/// Fully typed result of extracting one `.pbix` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedModel {
    pub tables: Vec<TableInfo>,
    pub measures: Vec<MeasureInfo>,
    pub relationships: Vec<RelationshipInfo>,
    pub queries: Vec<PowerQueryInfo>,
    pub metadata: ModelSummary,
    /// Schema section passed through untouched.
    pub schema: serde_json::Value,
}

impl ExtractedModel {
    /// Recompute the summary counts from the collections.
    pub fn recount(&mut self) {
        self.metadata.table_count = self.tables.len() as u64;
        self.metadata.measure_count = self.measures.len() as u64;
        self.metadata.relationship_count = self.relationships.len() as u64;
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}

// ── Stored projects ────────────────────────────────────────────────

/// Everything needed to write (or replace) one project row.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub file_path: PathBuf,
    pub file_hash: String,
    pub last_analyzed: DateTime<Utc>,
    pub model_size: u64,
    pub model: ExtractedModel,
}

/// A project row as listed by the store (blobs reduced to counts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub file_path: String,
    pub file_hash: String,
    pub last_analyzed: DateTime<Utc>,
    pub model_size: u64,
    pub table_count: u64,
    pub measure_count: u64,
}

/// A full project row with its raw JSON blobs.
#[derive(Debug, Clone)]
pub struct StoredProject {
    pub id: ProjectId,
    pub name: String,
    pub file_path: String,
    pub file_hash: String,
    pub last_analyzed: DateTime<Utc>,
    pub model_size: u64,
    pub blobs: ProjectBlobs,
}

/// Raw JSON text columns of a project row. `None` means SQL NULL.
#[derive(Debug, Clone, Default)]
pub struct ProjectBlobs {
    pub tables: Option<String>,
    pub metadata: Option<String>,
    pub schema: Option<String>,
    pub measures: Option<String>,
    pub relationships: Option<String>,
    pub queries: Option<String>,
}

/// The subset of a project the indexer and impact search scan.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub project: String,
    pub tables: Option<String>,
    pub measures: Option<String>,
}

/// Reference to a stored project by row id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(ProjectId),
    Name(String),
}

impl std::str::FromStr for ProjectRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Name(s.to_string()), |id| Self::Id(ProjectId(id))))
    }
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// ── Reports ────────────────────────────────────────────────────────

/// Which kind of model entity a sharing report is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Table,
    Measure,
    Column,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Measure => "measure",
            Self::Column => "column",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity name found in more than one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEntity {
    pub name: String,
    pub project_count: usize,
    /// Sorted project names joined with `", "`.
    pub projects: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ref_parses_ids_and_names() {
        assert_eq!("42".parse::<ProjectRef>().unwrap(), ProjectRef::Id(ProjectId(42)));
        assert_eq!(
            "Sales Report".parse::<ProjectRef>().unwrap(),
            ProjectRef::Name("Sales Report".into())
        );
    }

    #[test]
    fn column_defaults_apply_when_fields_missing() {
        let col: ColumnInfo = serde_json::from_str(r#"{"name":"Amount"}"#).unwrap();
        assert_eq!(col.data_type, "Unknown");
        assert!(!col.is_calculated);

        let rel: RelationshipInfo = serde_json::from_str(
            r#"{"from_table":"Sales","from_column":"CustomerID","to_table":"Customer","to_column":"ID"}"#,
        )
        .unwrap();
        assert_eq!(rel.cardinality, "Unknown");
    }
}
