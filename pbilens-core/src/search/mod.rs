//! Impact search: case-insensitive substring scan over every stored project.

use serde::{Deserialize, Serialize};

use crate::index::{decode_measures, decode_tables};
use crate::store::MetadataStore;
use crate::types::CatalogEntry;

/// Which entity names a search term is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Table,
    Measure,
    Column,
}

impl SearchScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Table => "table",
            Self::Measure => "measure",
            Self::Column => "column",
        }
    }

    fn tables(self) -> bool {
        matches!(self, Self::All | Self::Table)
    }

    fn columns(self) -> bool {
        matches!(self, Self::All | Self::Column)
    }

    /// Measure names and DAX bodies share one scope.
    fn measures(self) -> bool {
        matches!(self, Self::All | Self::Measure)
    }
}

impl std::fmt::Display for SearchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "table" | "tables" => Ok(Self::Table),
            "measure" | "measures" => Ok(Self::Measure),
            "column" | "columns" => Ok(Self::Column),
            other => Err(format!(
                "unknown search scope `{other}` (expected all, table, measure, or column)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMatch {
    pub project: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub project: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureMatch {
    pub project: String,
    pub table: String,
    pub measure: String,
    pub expression: String,
}

/// The four independent result buckets of an impact search.
///
/// `measures` holds name matches and `dax_references` holds expression-body
/// matches; one measure can appear in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub term: String,
    pub scope: SearchScope,
    pub tables: Vec<TableMatch>,
    pub columns: Vec<ColumnMatch>,
    pub measures: Vec<MeasureMatch>,
    pub dax_references: Vec<MeasureMatch>,
}

impl ImpactReport {
    pub fn total(&self) -> usize {
        self.tables.len() + self.columns.len() + self.measures.len() + self.dax_references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Scan `catalog` for `term`. Results follow project storage order, then the
/// order of entities within each project. A blank term matches nothing.
pub fn search(catalog: &[CatalogEntry], term: &str, scope: SearchScope) -> ImpactReport {
    let term = term.trim();
    let mut report = ImpactReport {
        term: term.to_string(),
        scope,
        ..ImpactReport::default()
    };
    if term.is_empty() {
        return report;
    }
    let needle = term.to_lowercase();
    let hit = |text: &str| text.to_lowercase().contains(&needle);

    for entry in catalog {
        if scope.tables() || scope.columns() {
            for table in decode_tables(entry) {
                if scope.tables() && hit(&table.name) {
                    report.tables.push(TableMatch {
                        project: entry.project.clone(),
                        table: table.name.clone(),
                    });
                }
                if scope.columns() {
                    for column in table.columns.iter().filter(|c| hit(&c.name)) {
                        report.columns.push(ColumnMatch {
                            project: entry.project.clone(),
                            table: table.name.clone(),
                            column: column.name.clone(),
                            data_type: column.data_type.clone(),
                        });
                    }
                }
            }
        }

        if scope.measures() {
            for measure in decode_measures(entry) {
                let found = MeasureMatch {
                    project: entry.project.clone(),
                    table: measure.table_name,
                    measure: measure.name,
                    expression: measure.expression,
                };
                if hit(&found.expression) {
                    report.dax_references.push(found.clone());
                }
                if hit(&found.measure) {
                    report.measures.push(found);
                }
            }
        }
    }
    report
}

/// Load the catalog from `store` and run [`search`] over it.
pub async fn search_impact(
    store: &dyn MetadataStore,
    term: &str,
    scope: SearchScope,
) -> crate::error::Result<ImpactReport> {
    let catalog = store.load_catalog().await?;
    Ok(search(&catalog, term, scope))
}
